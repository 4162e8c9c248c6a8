use crate::error::{AppError, Result};
use crate::models::{Habit, NewHabit};
use crate::sync::{merge_history, read_with_fallback, with_local_fallback, Outcome, Session, Stores};
use chrono::NaiveDate;

/// Non-negotiables: the short list of habits checked off each day.
pub struct HabitService {
    stores: Stores,
    free_habit_limit: usize,
}

impl HabitService {
    pub fn new(stores: Stores, free_habit_limit: usize) -> Self {
        Self {
            stores,
            free_habit_limit,
        }
    }

    /// Remote habits first, then anything only the cache has seen.
    pub async fn list(&self, session: &Session) -> Result<Vec<Habit>> {
        let local = self.stores.local.load_habits(session.storage_key_owner())?;

        let remote = match self.stores.remote_for(session) {
            Some((db, user_id)) => match db.list_habits(user_id).await {
                Ok(habits) => Some(habits),
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Failed to fetch remote habits");
                    None
                }
            },
            None => None,
        };

        Ok(merge_history(session, local, remote))
    }

    pub async fn add(&self, session: &Session, new_habit: NewHabit) -> Result<Outcome<Habit>> {
        if new_habit.text.trim().is_empty() {
            return Err(AppError::InvalidInput("Habit text is required".to_string()));
        }

        let owner = session.storage_key_owner();
        let mut habits = self.list(session).await?;
        if !session.is_premium && habits.len() >= self.free_habit_limit {
            return Err(AppError::HabitLimitReached {
                limit: self.free_habit_limit,
            });
        }

        let habit = Habit::new(owner, new_habit);
        habits.push(habit.clone());

        let outcome = with_local_fallback(
            session,
            || {
                self.stores.local.save_habits(owner, &habits)?;
                Ok(habit.clone())
            },
            self.stores
                .remote_for(session)
                .map(|(db, _)| db.add_habit(&habit, self.free_habit_limit)),
        )
        .await?;

        tracing::info!(user_id = owner, habit_id = %outcome.value().id, "Habit added");
        Ok(outcome)
    }

    pub async fn toggle(&self, session: &Session, habit_id: &str, today: NaiveDate) -> Result<Outcome<Habit>> {
        self.modify(session, habit_id, |habit| {
            habit.toggle(today);
            Ok(())
        })
        .await
    }

    pub async fn update_quantity(
        &self,
        session: &Session,
        habit_id: &str,
        quantity: u32,
        today: NaiveDate,
    ) -> Result<Outcome<Habit>> {
        self.modify(session, habit_id, |habit| {
            if !habit.is_countable() {
                return Err(AppError::InvalidInput(format!(
                    "Habit {} has no target quantity",
                    habit.id
                )));
            }
            habit.set_quantity(quantity, today);
            Ok(())
        })
        .await
    }

    pub async fn delete(&self, session: &Session, habit_id: &str) -> Result<Outcome<()>> {
        let owner = session.storage_key_owner();
        let mut habits = self.list(session).await?;
        let before = habits.len();
        habits.retain(|h| h.id != habit_id);
        if habits.len() == before {
            return Err(AppError::NotFound(format!("Habit {}", habit_id)));
        }

        with_local_fallback(
            session,
            || self.stores.local.save_habits(owner, &habits),
            self.stores
                .remote_for(session)
                .map(|(db, user_id)| db.delete_habit(user_id, habit_id)),
        )
        .await
    }

    /// Clears every habit's `completed` flag once per calendar day. Returns
    /// `false` when today's reset already ran.
    pub async fn reset_for_new_day(&self, session: &Session, today: NaiveDate) -> Result<bool> {
        let owner = session.storage_key_owner();
        if self.stores.local.load_habit_reset_date(owner)? == Some(today) {
            return Ok(false);
        }

        let mut habits = self.list(session).await?;
        for habit in habits.iter_mut() {
            habit.reset_for_new_day(today);
        }

        with_local_fallback(
            session,
            || {
                self.stores.local.save_habits(owner, &habits)?;
                self.stores.local.save_habit_reset_date(owner, today)
            },
            self.stores
                .remote_for(session)
                .map(|(db, _)| db.update_habits(&habits)),
        )
        .await?;

        tracing::info!(user_id = owner, date = %today, count = habits.len(), "Habits reset for new day");
        Ok(true)
    }

    /// Used by the reflection pipeline: remote when online, cache otherwise.
    pub(crate) async fn current(&self, session: &Session) -> Result<Vec<Habit>> {
        let owner = session.storage_key_owner();
        read_with_fallback(
            session,
            || self.stores.local.load_habits(owner),
            self.stores
                .remote_for(session)
                .map(|(db, user_id)| db.list_habits(user_id)),
        )
        .await
    }

    async fn modify<F>(&self, session: &Session, habit_id: &str, change: F) -> Result<Outcome<Habit>>
    where
        F: FnOnce(&mut Habit) -> Result<()>,
    {
        let owner = session.storage_key_owner();
        let mut habits = self.list(session).await?;
        let habit = habits
            .iter_mut()
            .find(|h| h.id == habit_id)
            .ok_or_else(|| AppError::NotFound(format!("Habit {}", habit_id)))?;
        change(habit)?;
        let updated = habit.clone();

        with_local_fallback(
            session,
            || {
                self.stores.local.save_habits(owner, &habits)?;
                Ok(updated.clone())
            },
            self.stores
                .remote_for(session)
                .map(|(db, _)| db.update_habit(&updated)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteDatabase;
    use crate::models::{User, UserProfile};
    use crate::storage::LocalStorage;
    use chrono::Utc;
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn named(text: &str) -> NewHabit {
        NewHabit {
            text: text.to_string(),
            ..Default::default()
        }
    }

    fn local_service(dir: &tempfile::TempDir) -> HabitService {
        let local = Arc::new(LocalStorage::with_base_dir(dir.path()).unwrap());
        HabitService::new(Stores::local_only(local), 3)
    }

    #[tokio::test]
    async fn test_free_tier_cap() {
        let dir = tempfile::tempdir().unwrap();
        let habits = local_service(&dir);
        let session = Session::guest();

        for name in ["Read", "Run", "Write"] {
            habits.add(&session, named(name)).await.unwrap();
        }
        let fourth = habits.add(&session, named("Meditate")).await;
        assert!(matches!(fourth, Err(AppError::HabitLimitReached { limit: 3 })));

        let premium = Session {
            is_premium: true,
            ..Session::guest()
        };
        habits.add(&premium, named("Meditate")).await.unwrap();
        assert_eq!(habits.list(&session).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = local_service(&dir).add(&Session::guest(), named("   ")).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_toggle_delete_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let habits = local_service(&dir);
        let session = Session::guest();

        let read = habits.add(&session, named("Read")).await.unwrap().into_inner();
        let toggled = habits.toggle(&session, &read.id, day(1)).await.unwrap();
        assert!(matches!(toggled, Outcome::Local(_)));
        assert!(toggled.value().completed);

        assert!(habits.reset_for_new_day(&session, day(2)).await.unwrap());
        assert!(!habits.reset_for_new_day(&session, day(2)).await.unwrap());
        let after = habits.list(&session).await.unwrap();
        assert!(!after[0].completed);
        assert_eq!(after[0].streak, 1);

        habits.delete(&session, &read.id).await.unwrap();
        assert!(habits.list(&session).await.unwrap().is_empty());
        assert!(matches!(
            habits.delete(&session, &read.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_quantity_on_plain_habit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let habits = local_service(&dir);
        let session = Session::guest();
        let plain = habits.add(&session, named("Stretch")).await.unwrap().into_inner();

        let result = habits.update_quantity(&session, &plain.id, 5, day(1)).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_online_writes_reach_remote() {
        let dir = tempfile::tempdir().unwrap();
        let local = Arc::new(LocalStorage::with_base_dir(dir.path()).unwrap());
        let db = Arc::new(SqliteDatabase::in_memory().await.unwrap());
        let profile = UserProfile {
            user_id: "u1".to_string(),
            name: "Sam".to_string(),
            email: "sam@example.com".to_string(),
            picture: String::new(),
        };
        db.insert_user(&User::with_trial(profile, 7, Utc::now())).await.unwrap();

        let habits = HabitService::new(Stores::new(local, Some(db.clone())), 3);
        let session = Session::authenticated("u1", true);

        let outcome = habits.add(&session, named("Read")).await.unwrap();
        assert!(matches!(outcome, Outcome::Remote(_)));
        assert_eq!(db.list_habits("u1").await.unwrap().len(), 1);
        assert_eq!(habits.list(&session).await.unwrap().len(), 1);
    }
}
