pub mod merge;

pub use merge::{merge_history, MergeKey};

use crate::config::SessionConfig;
use crate::database::SqliteDatabase;
use crate::error::Result;
use crate::storage::{LocalStorage, GUEST_OWNER};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    Guest,
    AuthenticatedOnline,
    /// Identity present but the remote write for one operation failed.
    AuthenticatedDegraded,
}

/// Who is acting and whether the remote store may be used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Option<String>,
    pub force_guest_mode: bool,
    pub is_premium: bool,
}

impl Session {
    pub fn guest() -> Self {
        Self::default()
    }

    pub fn authenticated(user_id: impl Into<String>, is_premium: bool) -> Self {
        Self {
            user_id: Some(user_id.into()),
            force_guest_mode: false,
            is_premium,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            force_guest_mode: config.force_guest_mode,
            ..Self::default()
        }
    }

    pub fn sign_in(&mut self, user_id: impl Into<String>, is_premium: bool) {
        self.user_id = Some(user_id.into());
        self.is_premium = is_premium;
    }

    /// Escape hatch: stop talking to the remote store for the rest of the
    /// session. There is no way back.
    pub fn force_guest(&mut self) {
        self.force_guest_mode = true;
    }

    pub fn mode(&self) -> StorageMode {
        match (&self.user_id, self.force_guest_mode) {
            (Some(_), false) => StorageMode::AuthenticatedOnline,
            _ => StorageMode::Guest,
        }
    }

    /// Namespace for local cache keys.
    pub fn storage_key_owner(&self) -> &str {
        self.user_id.as_deref().unwrap_or(GUEST_OWNER)
    }

    /// The user id to use against the remote store, only when online.
    pub fn remote_user(&self) -> Option<&str> {
        match self.mode() {
            StorageMode::AuthenticatedOnline => self.user_id.as_deref(),
            _ => None,
        }
    }
}

/// Where a write ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "storage", content = "value", rename_all = "snake_case")]
pub enum Outcome<T> {
    Local(T),
    Remote(T),
    Degraded(T),
}

impl<T> Outcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            Outcome::Local(v) | Outcome::Remote(v) | Outcome::Degraded(v) => v,
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Local(v) | Outcome::Remote(v) | Outcome::Degraded(v) => v,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(_))
    }

    pub fn mode(&self) -> StorageMode {
        match self {
            Outcome::Local(_) => StorageMode::Guest,
            Outcome::Remote(_) => StorageMode::AuthenticatedOnline,
            Outcome::Degraded(_) => StorageMode::AuthenticatedDegraded,
        }
    }
}

/// Both stores, shared by every service.
#[derive(Clone)]
pub struct Stores {
    pub local: Arc<LocalStorage>,
    pub remote: Option<Arc<SqliteDatabase>>,
}

impl Stores {
    pub fn new(local: Arc<LocalStorage>, remote: Option<Arc<SqliteDatabase>>) -> Self {
        Self { local, remote }
    }

    pub fn local_only(local: Arc<LocalStorage>) -> Self {
        Self::new(local, None)
    }

    /// Remote store and user id, when this session may use them.
    pub fn remote_for<'a>(&'a self, session: &'a Session) -> Option<(&'a SqliteDatabase, &'a str)> {
        let user_id = session.remote_user()?;
        self.remote.as_deref().map(|db| (db, user_id))
    }
}

/// Runs `local` unconditionally, then awaits `remote` when the session is
/// online. The remote future is never polled for guests.
pub async fn with_local_fallback<T, L, Fut>(
    session: &Session,
    local: L,
    remote: Option<Fut>,
) -> Result<Outcome<T>>
where
    L: FnOnce() -> Result<T>,
    Fut: Future<Output = Result<()>>,
{
    let value = local()?;

    if session.mode() == StorageMode::Guest {
        return Ok(Outcome::Local(value));
    }
    let Some(remote) = remote else {
        return Ok(Outcome::Local(value));
    };

    match remote.await {
        Ok(()) => Ok(Outcome::Remote(value)),
        Err(e) => {
            tracing::warn!(
                user_id = session.storage_key_owner(),
                error = %e,
                "Remote write failed, keeping local copy"
            );
            Ok(Outcome::Degraded(value))
        }
    }
}

/// Remote read when online, local cache otherwise or on remote failure.
pub async fn read_with_fallback<T, L, Fut>(session: &Session, local: L, remote: Option<Fut>) -> Result<T>
where
    L: FnOnce() -> Result<T>,
    Fut: Future<Output = Result<T>>,
{
    if session.mode() == StorageMode::AuthenticatedOnline {
        if let Some(remote) = remote {
            match remote.await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!(
                        user_id = session.storage_key_owner(),
                        error = %e,
                        "Remote read failed, using local cache"
                    );
                }
            }
        }
    }
    local()
}
