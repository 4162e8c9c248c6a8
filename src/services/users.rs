use crate::database::SqliteDatabase;
use crate::error::{AppError, Result};
use crate::models::{User, UserProfile};
use crate::sync::{Session, Stores};
use chrono::{DateTime, Utc};

pub struct UserService {
    stores: Stores,
    trial_days: i64,
}

impl UserService {
    pub fn new(stores: Stores, trial_days: i64) -> Self {
        Self { stores, trial_days }
    }

    /// Sign-in upsert. Existing users come back unchanged; first sign-in
    /// creates the user with a premium trial. The local cache always gets a
    /// copy so the profile survives a remote outage.
    pub async fn store_user(&self, profile: UserProfile, now: DateTime<Utc>) -> Result<User> {
        self.upsert(profile, now, self.stores.remote.as_deref()).await
    }

    /// Stores the profile and moves the session online. A session forced
    /// into guest mode keeps its identity but never reaches the remote store.
    pub async fn sign_in(&self, session: &mut Session, profile: UserProfile) -> Result<User> {
        let now = Utc::now();
        let remote = if session.force_guest_mode {
            None
        } else {
            self.stores.remote.as_deref()
        };
        let user = self.upsert(profile, now, remote).await?;
        session.sign_in(user.user_id.clone(), user.has_premium(now));
        tracing::info!(user_id = %user.user_id, mode = ?session.mode(), "Signed in");
        Ok(user)
    }

    pub fn cached(&self, session: &Session) -> Result<Option<User>> {
        self.stores.local.load_user(session.storage_key_owner())
    }

    async fn upsert(
        &self,
        profile: UserProfile,
        now: DateTime<Utc>,
        remote: Option<&SqliteDatabase>,
    ) -> Result<User> {
        if profile.user_id.trim().is_empty() {
            return Err(AppError::InvalidInput("User id is required".to_string()));
        }
        let user_id = profile.user_id.clone();

        let user = match remote {
            Some(db) => match db.get_user(&user_id).await {
                Ok(Some(existing)) => existing,
                Ok(None) => {
                    let user = User::with_trial(profile, self.trial_days, now);
                    if let Err(e) = db.insert_user(&user).await {
                        tracing::warn!(user_id = %user_id, error = %e, "Failed to store new user remotely");
                    }
                    tracing::info!(user_id = %user_id, trial_days = self.trial_days, "New user, trial started");
                    user
                }
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Remote user lookup failed, using cache");
                    self.local_or_new(profile, now)?
                }
            },
            None => self.local_or_new(profile, now)?,
        };

        self.stores.local.save_user(&user_id, &user)?;
        Ok(user)
    }

    fn local_or_new(&self, profile: UserProfile, now: DateTime<Utc>) -> Result<User> {
        match self.stores.local.load_user(&profile.user_id)? {
            Some(user) => Ok(user),
            None => Ok(User::with_trial(profile, self.trial_days, now)),
        }
    }
}
