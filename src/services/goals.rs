use crate::audit::AuditEngine;
use crate::error::{AppError, Result};
use crate::models::{Goal, GoalAudit, NewGoal};
use crate::sync::{merge_history, read_with_fallback, with_local_fallback, Outcome, Session, Stores};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum GoalUpdate {
    Percent(u8),
    Number(f64),
}

pub struct GoalService {
    stores: Stores,
    audit: Arc<AuditEngine>,
}

impl GoalService {
    pub fn new(stores: Stores, audit: Arc<AuditEngine>) -> Self {
        Self { stores, audit }
    }

    pub async fn list(&self, session: &Session) -> Result<Vec<Goal>> {
        let local = self.stores.local.load_goals(session.storage_key_owner())?;

        let remote = match self.stores.remote_for(session) {
            Some((db, user_id)) => match db.list_goals(user_id).await {
                Ok(goals) => Some(goals),
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Failed to fetch remote goals");
                    None
                }
            },
            None => None,
        };

        Ok(merge_history(session, local, remote))
    }

    /// Creates the goal. When `run_audit` is set the provider chain reviews
    /// it first; the review is advisory and never blocks creation.
    pub async fn create(
        &self,
        session: &Session,
        new_goal: NewGoal,
        run_audit: bool,
    ) -> Result<(Outcome<Goal>, Option<GoalAudit>)> {
        if new_goal.title.trim().is_empty() {
            return Err(AppError::InvalidInput("Goal title is required".to_string()));
        }

        let review = if run_audit {
            let description = new_goal.smart.specific.clone().unwrap_or_default();
            Some(self.audit.goal_audit(&new_goal.title, &description).await)
        } else {
            None
        };

        let owner = session.storage_key_owner();
        let goal = Goal::new(owner, new_goal);
        let mut goals = self.list(session).await?;
        goals.push(goal.clone());

        let outcome = self.persist(session, &goals, goal).await?;
        tracing::info!(user_id = owner, goal_id = %outcome.value().id, "Goal created");
        Ok((outcome, review))
    }

    pub async fn update_progress(
        &self,
        session: &Session,
        goal_id: &str,
        update: GoalUpdate,
    ) -> Result<Outcome<Goal>> {
        let mut goals = self.list(session).await?;
        let goal = goals
            .iter_mut()
            .find(|g| g.id == goal_id)
            .ok_or_else(|| AppError::NotFound(format!("Goal {}", goal_id)))?;

        match update {
            GoalUpdate::Percent(progress) => goal.set_progress(progress),
            GoalUpdate::Number(current) if goal.is_numerical() => goal.record_number(current),
            GoalUpdate::Number(_) => {
                return Err(AppError::InvalidInput(format!(
                    "Goal {} has no numeric target",
                    goal_id
                )))
            }
        }
        let updated = goal.clone();

        self.persist(session, &goals, updated).await
    }

    pub async fn delete(&self, session: &Session, goal_id: &str) -> Result<Outcome<()>> {
        let owner = session.storage_key_owner();
        let mut goals = self.list(session).await?;
        let before = goals.len();
        goals.retain(|g| g.id != goal_id);
        if goals.len() == before {
            return Err(AppError::NotFound(format!("Goal {}", goal_id)));
        }

        with_local_fallback(
            session,
            || self.stores.local.save_goals(owner, &goals),
            self.stores
                .remote_for(session)
                .map(|(db, user_id)| db.delete_goal(user_id, goal_id)),
        )
        .await
    }

    pub(crate) async fn current(&self, session: &Session) -> Result<Vec<Goal>> {
        let owner = session.storage_key_owner();
        read_with_fallback(
            session,
            || self.stores.local.load_goals(owner),
            self.stores
                .remote_for(session)
                .map(|(db, user_id)| db.list_goals(user_id)),
        )
        .await
    }

    async fn persist(&self, session: &Session, goals: &[Goal], changed: Goal) -> Result<Outcome<Goal>> {
        let owner = session.storage_key_owner();
        with_local_fallback(
            session,
            || {
                self.stores.local.save_goals(owner, goals)?;
                Ok(changed.clone())
            },
            self.stores
                .remote_for(session)
                .map(|(db, _)| db.save_goal(&changed)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{client, ScriptedProvider};
    use crate::llm::PersonaConfig;
    use crate::models::{GoalCategory, GoalTerm, SmartFields};
    use crate::storage::LocalStorage;
    use chrono::NaiveDate;

    fn service(dir: &tempfile::TempDir, providers: Vec<Arc<ScriptedProvider>>) -> GoalService {
        let local = Arc::new(LocalStorage::with_base_dir(dir.path()).unwrap());
        let engine = AuditEngine::new(Arc::new(client(providers)), PersonaConfig::buddy());
        GoalService::new(Stores::local_only(local), Arc::new(engine))
    }

    fn marathon(target_number: Option<f64>) -> NewGoal {
        NewGoal {
            title: "Run a marathon".to_string(),
            category: GoalCategory::Health,
            term: GoalTerm::Year,
            target_date: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            smart: SmartFields::default(),
            target_number,
            unit: Some("km".to_string()),
        }
    }

    #[tokio::test]
    async fn test_failed_audit_does_not_block_creation() {
        let dir = tempfile::tempdir().unwrap();
        let goals = service(&dir, vec![ScriptedProvider::failing("gemini")]);
        let session = Session::guest();

        let (goal, review) = goals.create(&session, marathon(None), true).await.unwrap();
        assert_eq!(review, Some(GoalAudit::fallback()));
        assert_eq!(goals.list(&session).await.unwrap(), vec![goal.into_inner()]);
    }

    #[tokio::test]
    async fn test_create_without_audit_skips_providers() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::failing("gemini");
        let goals = service(&dir, vec![provider.clone()]);

        let (_, review) = goals.create(&Session::guest(), marathon(None), false).await.unwrap();
        assert!(review.is_none());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_progress_updates() {
        let dir = tempfile::tempdir().unwrap();
        let goals = service(&dir, Vec::new());
        let session = Session::guest();

        let (plain, _) = goals.create(&session, marathon(None), false).await.unwrap();
        let plain = plain.into_inner();
        let updated = goals
            .update_progress(&session, &plain.id, GoalUpdate::Percent(250))
            .await
            .unwrap();
        assert_eq!(updated.value().progress, 100);
        assert!(matches!(
            goals.update_progress(&session, &plain.id, GoalUpdate::Number(3.0)).await,
            Err(AppError::InvalidInput(_))
        ));

        let (numeric, _) = goals.create(&session, marathon(Some(40.0)), false).await.unwrap();
        let numeric = numeric.into_inner();
        let updated = goals
            .update_progress(&session, &numeric.id, GoalUpdate::Number(10.0))
            .await
            .unwrap();
        assert_eq!(updated.value().progress, 25);

        goals.delete(&session, &plain.id).await.unwrap();
        assert_eq!(goals.list(&session).await.unwrap().len(), 1);
    }
}
