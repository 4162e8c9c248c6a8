use crate::error::{AppError, Result};
use crate::models::{
    format_hour, parse_hour, sort_events, DailyPlan, LockState, PlanEvent, PlanLock, FIRST_HOUR, LAST_HOUR,
};
use crate::sync::{read_with_fallback, with_local_fallback, Outcome, Session, Stores};
use chrono::{DateTime, NaiveDate, Timelike, Utc};

pub struct PlanService {
    stores: Stores,
}

impl PlanService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn get(&self, session: &Session, date: NaiveDate) -> Result<DailyPlan> {
        let owner = session.storage_key_owner();
        let local = &self.stores.local;

        read_with_fallback(
            session,
            || Ok(DailyPlan::new(owner, date, local.load_plan(owner, date)?)),
            self.stores.remote_for(session).map(|(db, user_id)| async move {
                match db.get_daily_plan(user_id, date).await? {
                    Some(plan) => Ok(plan),
                    // Nothing remote yet; the cache may hold an unsynced plan.
                    None => Ok(DailyPlan::new(owner, date, local.load_plan(owner, date)?)),
                }
            }),
        )
        .await
    }

    pub fn lock_state(&self, session: &Session, today: NaiveDate) -> Result<LockState> {
        let lock = self.stores.local.load_plan_lock(session.storage_key_owner())?;
        Ok(lock.state_on(today))
    }

    fn ensure_unlocked(&self, session: &Session, date: NaiveDate) -> Result<()> {
        match self.lock_state(session, date)? {
            LockState::Locked => Err(AppError::PlanLocked),
            LockState::Unlocked => Ok(()),
        }
    }

    async fn persist(&self, session: &Session, plan: DailyPlan) -> Result<Outcome<DailyPlan>> {
        let owner = session.storage_key_owner();
        with_local_fallback(
            session,
            || {
                self.stores.local.save_plan(owner, plan.date, &plan.events)?;
                Ok(plan.clone())
            },
            self.stores
                .remote_for(session)
                .map(|(db, user_id)| {
                    let mut remote_plan = plan.clone();
                    remote_plan.user_id = user_id.to_string();
                    async move { db.upsert_daily_plan(&remote_plan).await }
                }),
        )
        .await
    }

    pub async fn add_event(
        &self,
        session: &Session,
        date: NaiveDate,
        title: &str,
        start: &str,
        event_type: &str,
    ) -> Result<Outcome<DailyPlan>> {
        self.ensure_unlocked(session, date)?;

        if title.trim().is_empty() {
            return Err(AppError::InvalidInput("Event title is required".to_string()));
        }
        validate_start(start)?;
        let event = PlanEvent::new(title, start, event_type)
            .ok_or_else(|| AppError::InvalidInput(format!("Invalid start time: {}", start)))?;

        let mut plan = self.get(session, date).await?;
        plan.events.push(event);
        sort_events(&mut plan.events);

        self.persist(session, plan).await
    }

    pub async fn remove_event(
        &self,
        session: &Session,
        date: NaiveDate,
        event_id: &str,
    ) -> Result<Outcome<DailyPlan>> {
        self.ensure_unlocked(session, date)?;

        let mut plan = self.get(session, date).await?;
        let before = plan.events.len();
        plan.events.retain(|e| e.id != event_id);
        if plan.events.len() == before {
            return Err(AppError::NotFound(format!("Plan event {}", event_id)));
        }

        self.persist(session, plan).await
    }

    /// Replaces every event of the day.
    pub async fn replace(
        &self,
        session: &Session,
        date: NaiveDate,
        events: Vec<PlanEvent>,
    ) -> Result<Outcome<DailyPlan>> {
        self.ensure_unlocked(session, date)?;
        let plan = DailyPlan::new(session.storage_key_owner(), date, events);
        self.persist(session, plan).await
    }

    /// Flips `completed` on one event. Allowed while locked.
    pub async fn toggle_event(
        &self,
        session: &Session,
        date: NaiveDate,
        event_id: &str,
    ) -> Result<Outcome<DailyPlan>> {
        let mut plan = self.get(session, date).await?;
        let event = plan
            .events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| AppError::NotFound(format!("Plan event {}", event_id)))?;
        event.completed = !event.completed;

        self.persist(session, plan).await
    }

    /// Commits today's plan. There is no unlock.
    pub async fn lock(&self, session: &Session, today: NaiveDate) -> Result<PlanLock> {
        let plan = self.get(session, today).await?;
        if plan.events.is_empty() {
            return Err(AppError::InvalidInput(
                "Add at least one block before locking the plan".to_string(),
            ));
        }

        let lock = PlanLock::locked_on(today);
        self.stores
            .local
            .save_plan_lock(session.storage_key_owner(), &lock)?;
        tracing::info!(user_id = session.storage_key_owner(), date = %today, "Plan locked");
        Ok(lock)
    }

    /// Percentage of the day's blocks marked complete.
    pub async fn momentum(&self, session: &Session, date: NaiveDate) -> Result<f32> {
        Ok(self.get(session, date).await?.completion_percentage())
    }

    /// The block whose start hour matches `now`.
    pub async fn current_block(&self, session: &Session, now: DateTime<Utc>) -> Result<Option<PlanEvent>> {
        let plan = self.get(session, now.date_naive()).await?;
        Ok(plan.event_at_hour(now.hour()).cloned())
    }
}

/// Hours in the day's window that have no block yet, formatted `HH:00`.
pub fn open_slots(plan: &DailyPlan) -> Vec<String> {
    (FIRST_HOUR..=LAST_HOUR)
        .filter(|h| plan.events.iter().all(|e| e.hour() != Some(*h)))
        .map(format_hour)
        .collect()
}

/// Validates a user-entered time before it reaches the plan.
pub fn validate_start(start: &str) -> Result<u32> {
    parse_hour(start).ok_or_else(|| AppError::InvalidInput(format!("Invalid start time: {}", start)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn service() -> (tempfile::TempDir, PlanService) {
        let dir = tempfile::tempdir().unwrap();
        let local = Arc::new(LocalStorage::with_base_dir(dir.path()).unwrap());
        (dir, PlanService::new(Stores::local_only(local)))
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[tokio::test]
    async fn test_lock_blocks_structural_edits_only() {
        let (_dir, plans) = service();
        let session = Session::guest();

        let plan = plans
            .add_event(&session, day(1), "Deep Work", "09:00", "deep-work")
            .await
            .unwrap()
            .into_inner();
        let event_id = plan.events[0].id.clone();

        plans.lock(&session, day(1)).await.unwrap();
        assert_eq!(plans.lock_state(&session, day(1)).unwrap(), LockState::Locked);

        let add = plans.add_event(&session, day(1), "Gym", "17:00", "rest").await;
        assert!(matches!(add, Err(AppError::PlanLocked)));
        let remove = plans.remove_event(&session, day(1), &event_id).await;
        assert!(matches!(remove, Err(AppError::PlanLocked)));
        let replace = plans.replace(&session, day(1), Vec::new()).await;
        assert!(matches!(replace, Err(AppError::PlanLocked)));

        let toggled = plans
            .toggle_event(&session, day(1), &event_id)
            .await
            .unwrap()
            .into_inner();
        assert!(toggled.events[0].completed);
        assert_eq!(plans.momentum(&session, day(1)).await.unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_lock_expires_next_day() {
        let (_dir, plans) = service();
        let session = Session::guest();
        plans
            .add_event(&session, day(1), "Write", "08:00", "")
            .await
            .unwrap();
        plans.lock(&session, day(1)).await.unwrap();

        assert_eq!(plans.lock_state(&session, day(2)).unwrap(), LockState::Unlocked);
        plans
            .add_event(&session, day(2), "Write", "08:00", "")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lock_requires_an_event() {
        let (_dir, plans) = service();
        let result = plans.lock(&Session::guest(), day(1)).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_invalid_start_rejected() {
        let (_dir, plans) = service();
        let result = plans
            .add_event(&Session::guest(), day(1), "Nap", "later", "rest")
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        let late = plans
            .add_event(&Session::guest(), day(1), "Nap", "25:00", "rest")
            .await;
        assert!(matches!(late, Err(AppError::InvalidInput(_))));
        assert!(validate_start("25:00").is_err());
        assert_eq!(validate_start("7:15").unwrap(), 7);
    }

    #[tokio::test]
    async fn test_current_block_and_slots() {
        let (_dir, plans) = service();
        let session = Session::guest();
        plans
            .add_event(&session, day(1), "Deep Work", "10:00", "deep-work")
            .await
            .unwrap();

        let at_ten = Utc.with_ymd_and_hms(2026, 3, 1, 10, 42, 0).unwrap();
        let block = plans.current_block(&session, at_ten).await.unwrap();
        assert_eq!(block.map(|b| b.title), Some("Deep Work".to_string()));

        let at_noon = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert!(plans.current_block(&session, at_noon).await.unwrap().is_none());

        let plan = plans.get(&session, day(1)).await.unwrap();
        let slots = open_slots(&plan);
        assert!(!slots.contains(&"10:00".to_string()));
        assert_eq!(slots.len(), 13);
    }

    #[tokio::test]
    async fn test_momentum_empty_plan_is_zero() {
        let (_dir, plans) = service();
        assert_eq!(plans.momentum(&Session::guest(), day(5)).await.unwrap(), 0.0);
    }
}
