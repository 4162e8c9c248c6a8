use crate::audit::{AuditEngine, AuditInput, AuditSource};
use crate::error::{AppError, Result};
use crate::models::{upsert_entry, DailyLogEntry, DailyPlan, DailyResult, PlanEvent, Stats};
use crate::momentum::apply_daily_result;
use crate::services::{GoalService, HabitService};
use crate::sync::{merge_history, read_with_fallback, with_local_fallback, Session, StorageMode, Stores};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionInput {
    pub reflection: String,
    pub energy: u8,
    pub mood: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionOutcome {
    pub entry: DailyLogEntry,
    pub stats: Stats,
    pub schedule: Vec<PlanEvent>,
    pub audit_source: AuditSource,
    /// `AuthenticatedDegraded` when any remote mirror failed.
    pub storage: StorageMode,
}

pub struct ReflectionService {
    stores: Stores,
    audit: Arc<AuditEngine>,
    habits: Arc<HabitService>,
    goals: Arc<GoalService>,
    in_flight: Mutex<HashSet<String>>,
}

/// Marks one user's submission as running until dropped.
struct SubmissionGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    owner: String,
}

impl<'a> SubmissionGuard<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<String>>, owner: &str) -> Result<Self> {
        let mut running = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(owner.to_string()) {
            return Err(AppError::SubmissionInProgress(owner.to_string()));
        }
        Ok(Self {
            in_flight,
            owner: owner.to_string(),
        })
    }
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.owner);
    }
}

impl ReflectionService {
    pub fn new(
        stores: Stores,
        audit: Arc<AuditEngine>,
        habits: Arc<HabitService>,
        goals: Arc<GoalService>,
    ) -> Self {
        Self {
            stores,
            audit,
            habits,
            goals,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub async fn submit(&self, session: &Session, input: ReflectionInput) -> Result<ReflectionOutcome> {
        self.submit_at(session, input, Utc::now()).await
    }

    pub async fn submit_at(
        &self,
        session: &Session,
        input: ReflectionInput,
        now: DateTime<Utc>,
    ) -> Result<ReflectionOutcome> {
        if input.reflection.trim().is_empty() {
            return Err(AppError::InvalidInput("Reflection cannot be empty".to_string()));
        }
        if !(1..=5).contains(&input.energy) {
            return Err(AppError::InvalidInput(format!(
                "Energy must be between 1 and 5, got {}",
                input.energy
            )));
        }

        let owner = session.storage_key_owner();
        let _guard = SubmissionGuard::acquire(&self.in_flight, owner)?;
        let today = now.date_naive();

        let habits = self.habits.current(session).await?;
        let goals = self.goals.current(session).await?;

        let audit = self
            .audit
            .run_daily_audit(&AuditInput {
                reflection: input.reflection.trim(),
                energy: input.energy,
                mood: &input.mood,
                goals: &goals,
                habits: &habits,
            })
            .await;

        let mut degraded = false;

        let entry = DailyLogEntry {
            user_id: owner.to_string(),
            date: today,
            reflection: input.reflection.trim().to_string(),
            energy: input.energy,
            mood: input.mood.clone(),
            productivity_score: audit.score,
            impact_score: audit.score,
            did_today_count: audit.did_today_count,
            report: audit.text.clone(),
            schedule: audit.schedule.clone(),
            created_at: now,
            updated_at: now,
        };
        let logged = with_local_fallback(
            session,
            || {
                let mut history = self.stores.local.load_history(owner)?;
                upsert_entry(&mut history, entry.clone());
                self.stores.local.save_history(owner, &history)?;
                Ok(history
                    .into_iter()
                    .find(|e| e.date == today)
                    .unwrap_or_else(|| entry.clone()))
            },
            self.stores
                .remote_for(session)
                .map(|(db, _)| db.upsert_daily_log(&entry)),
        )
        .await?;
        degraded |= logged.is_degraded();

        let previous = self.previous_stats(session).await?;
        let stats = apply_daily_result(
            previous.as_ref(),
            &DailyResult {
                date: today,
                productivity_score: audit.score,
                did_today_count: audit.did_today_count,
            },
            now,
        );
        let saved = with_local_fallback(
            session,
            || self.save_local_stats(owner, &stats),
            self.stores
                .remote_for(session)
                .map(|(db, user_id)| db.upsert_stats(user_id, &stats)),
        )
        .await?;
        degraded |= saved.is_degraded();

        if !audit.schedule.is_empty() {
            if let Some(tomorrow) = today.succ_opt() {
                degraded |= self.replace_plan(session, tomorrow, &audit.schedule).await?;
            }
        }

        tracing::info!(
            user_id = owner,
            date = %today,
            score = audit.score,
            counted = audit.did_today_count,
            streak = stats.streak,
            momentum = stats.score,
            "Reflection recorded"
        );

        Ok(ReflectionOutcome {
            entry: logged.into_inner(),
            stats,
            schedule: audit.schedule,
            audit_source: audit.source,
            storage: if degraded {
                StorageMode::AuthenticatedDegraded
            } else {
                session.mode()
            },
        })
    }

    /// Remote history first, then any days only this device has.
    pub async fn history(&self, session: &Session) -> Result<Vec<DailyLogEntry>> {
        let local = self.stores.local.load_history(session.storage_key_owner())?;

        let remote = match self.stores.remote_for(session) {
            Some((db, user_id)) => match db.list_daily_logs(user_id).await {
                Ok(logs) => Some(logs),
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Failed to fetch remote history");
                    None
                }
            },
            None => None,
        };

        Ok(merge_history(session, local, remote))
    }

    async fn previous_stats(&self, session: &Session) -> Result<Option<Stats>> {
        let owner = session.storage_key_owner();
        let local = &self.stores.local;

        read_with_fallback(
            session,
            || local.load_stats(owner),
            self.stores.remote_for(session).map(|(db, user_id)| async move {
                match db.get_stats(user_id).await? {
                    Some(stats) => Ok(Some(stats)),
                    None => local.load_stats(owner),
                }
            }),
        )
        .await
    }

    fn save_local_stats(&self, owner: &str, stats: &Stats) -> Result<()> {
        self.stores.local.save_stats(owner, stats)?;
        if let Some(mut user) = self.stores.local.load_user(owner)? {
            user.momentum_score = stats.score;
            user.streak = stats.streak;
            self.stores.local.save_user(owner, &user)?;
        }
        Ok(())
    }

    /// Generated schedules replace the target day's plan wholesale. Returns
    /// whether the remote mirror failed.
    async fn replace_plan(&self, session: &Session, date: NaiveDate, schedule: &[PlanEvent]) -> Result<bool> {
        let owner = session.storage_key_owner();
        let plan = DailyPlan::new(owner, date, schedule.to_vec());

        let outcome = with_local_fallback(
            session,
            || self.stores.local.save_plan(owner, date, &plan.events),
            self.stores
                .remote_for(session)
                .map(|(db, _)| db.upsert_daily_plan(&plan)),
        )
        .await?;
        Ok(outcome.is_degraded())
    }
}
