use crate::error::{AppError, Result};
use crate::models::{ChatMessage, DailyLogEntry, Goal, Habit, PlanEvent, PlanLock, Stats, User};
use chrono::NaiveDate;
use dirs::data_dir;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const GUEST_OWNER: &str = "guest";

/// Blob kinds in the local cache. Each is stored under `<entity>_<owner>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEntity {
    Habits,
    HabitsReset,
    Goals,
    History,
    Stats,
    Plans,
    PlanLock,
    Chat,
    User,
}

impl CacheEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheEntity::Habits => "habits",
            CacheEntity::HabitsReset => "habits_reset",
            CacheEntity::Goals => "goals",
            CacheEntity::History => "history",
            CacheEntity::Stats => "stats",
            CacheEntity::Plans => "plans",
            CacheEntity::PlanLock => "plan_lock",
            CacheEntity::Chat => "chat",
            CacheEntity::User => "user",
        }
    }

    pub fn key(&self, owner: &str) -> String {
        format!("{}_{}", self.as_str(), owner)
    }
}

/// Per-device JSON cache. Every value is a whole blob; writes go through a
/// temp file and a rename so a crash never leaves half a file behind.
#[derive(Debug)]
pub struct LocalStorage {
    data_dir: PathBuf,
}

impl LocalStorage {
    pub fn new() -> Result<Self> {
        let base_dir = data_dir()
            .ok_or_else(|| AppError::Storage("Could not find data directory".to_string()))?
            .join("antigravity")
            .join("cache");
        Self::with_base_dir(base_dir)
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = base_dir.into();
        fs::create_dir_all(&data_dir)
            .map_err(|e| AppError::Storage(format!("Failed to create data directory: {}", e)))?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let file_path = self.path_for(key);
        if !file_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&file_path)
            .map_err(|e| AppError::Storage(format!("Failed to read {}: {}", key, e)))?;

        let value = serde_json::from_str::<T>(&content)
            .map_err(|e| AppError::Storage(format!("Failed to parse {}: {}", key, e)))?;

        Ok(Some(value))
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let file_path = self.path_for(key);
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| AppError::Storage(format!("Failed to serialize {}: {}", key, e)))?;

        let tmp_path = file_path.with_extension(format!("tmp.{}", std::process::id()));
        fs::write(&tmp_path, json)
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", key, e)))?;

        if let Err(e) = fs::rename(&tmp_path, &file_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(AppError::Storage(format!("Failed to commit {}: {}", key, e)));
        }

        Ok(())
    }

    fn load_or_default<T: DeserializeOwned + Default>(
        &self,
        entity: CacheEntity,
        owner: &str,
    ) -> Result<T> {
        Ok(self.get(&entity.key(owner))?.unwrap_or_default())
    }

    // Habits
    pub fn load_habits(&self, owner: &str) -> Result<Vec<Habit>> {
        self.load_or_default(CacheEntity::Habits, owner)
    }

    pub fn save_habits(&self, owner: &str, habits: &[Habit]) -> Result<()> {
        self.set(&CacheEntity::Habits.key(owner), habits)
    }

    pub fn load_habit_reset_date(&self, owner: &str) -> Result<Option<NaiveDate>> {
        self.get(&CacheEntity::HabitsReset.key(owner))
    }

    pub fn save_habit_reset_date(&self, owner: &str, date: NaiveDate) -> Result<()> {
        self.set(&CacheEntity::HabitsReset.key(owner), &date)
    }

    // Goals
    pub fn load_goals(&self, owner: &str) -> Result<Vec<Goal>> {
        self.load_or_default(CacheEntity::Goals, owner)
    }

    pub fn save_goals(&self, owner: &str, goals: &[Goal]) -> Result<()> {
        self.set(&CacheEntity::Goals.key(owner), goals)
    }

    // Reflection history, newest first
    pub fn load_history(&self, owner: &str) -> Result<Vec<DailyLogEntry>> {
        self.load_or_default(CacheEntity::History, owner)
    }

    pub fn save_history(&self, owner: &str, history: &[DailyLogEntry]) -> Result<()> {
        self.set(&CacheEntity::History.key(owner), history)
    }

    pub fn load_stats(&self, owner: &str) -> Result<Option<Stats>> {
        self.get(&CacheEntity::Stats.key(owner))
    }

    pub fn save_stats(&self, owner: &str, stats: &Stats) -> Result<()> {
        self.set(&CacheEntity::Stats.key(owner), stats)
    }

    // Plans are kept as one map of date -> events per owner
    pub fn load_plans(&self, owner: &str) -> Result<BTreeMap<NaiveDate, Vec<PlanEvent>>> {
        self.load_or_default(CacheEntity::Plans, owner)
    }

    pub fn load_plan(&self, owner: &str, date: NaiveDate) -> Result<Vec<PlanEvent>> {
        Ok(self.load_plans(owner)?.remove(&date).unwrap_or_default())
    }

    pub fn save_plan(&self, owner: &str, date: NaiveDate, events: &[PlanEvent]) -> Result<()> {
        let mut plans = self.load_plans(owner)?;
        plans.insert(date, events.to_vec());
        self.set(&CacheEntity::Plans.key(owner), &plans)
    }

    pub fn load_plan_lock(&self, owner: &str) -> Result<PlanLock> {
        self.load_or_default(CacheEntity::PlanLock, owner)
    }

    pub fn save_plan_lock(&self, owner: &str, lock: &PlanLock) -> Result<()> {
        self.set(&CacheEntity::PlanLock.key(owner), lock)
    }

    // Chat
    pub fn load_chat(&self, owner: &str) -> Result<Vec<ChatMessage>> {
        self.load_or_default(CacheEntity::Chat, owner)
    }

    pub fn save_chat(&self, owner: &str, messages: &[ChatMessage]) -> Result<()> {
        self.set(&CacheEntity::Chat.key(owner), messages)
    }

    pub fn load_user(&self, owner: &str) -> Result<Option<User>> {
        self.get(&CacheEntity::User.key(owner))
    }

    pub fn save_user(&self, owner: &str, user: &User) -> Result<()> {
        self.set(&CacheEntity::User.key(owner), user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewHabit;
    use chrono::Utc;

    fn storage() -> (tempfile::TempDir, LocalStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::with_base_dir(dir.path()).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_keys_are_namespaced() {
        assert_eq!(CacheEntity::Habits.key("guest"), "habits_guest");
        assert_eq!(CacheEntity::PlanLock.key("user_9"), "plan_lock_user_9");
    }

    #[test]
    fn test_missing_key_reads_empty() {
        let (_dir, storage) = storage();
        assert!(storage.load_habits(GUEST_OWNER).unwrap().is_empty());
        assert!(storage.load_stats(GUEST_OWNER).unwrap().is_none());
        assert_eq!(storage.load_plan_lock(GUEST_OWNER).unwrap(), PlanLock::default());
    }

    #[test]
    fn test_owners_do_not_interfere() {
        let (_dir, storage) = storage();
        let habit = Habit::new(
            "alice",
            NewHabit {
                text: "Stretch".to_string(),
                ..Default::default()
            },
        );
        storage.save_habits("alice", &[habit]).unwrap();

        assert_eq!(storage.load_habits("alice").unwrap().len(), 1);
        assert!(storage.load_habits("bob").unwrap().is_empty());
        assert!(storage.load_habits(GUEST_OWNER).unwrap().is_empty());
    }

    #[test]
    fn test_plans_keyed_by_date() {
        let (_dir, storage) = storage();
        let d1 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let event = PlanEvent::new("Write", "08:00", "deep-work").unwrap();

        storage.save_plan(GUEST_OWNER, d1, &[event.clone()]).unwrap();
        storage.save_plan(GUEST_OWNER, d2, &[]).unwrap();

        assert_eq!(storage.load_plan(GUEST_OWNER, d1).unwrap(), vec![event]);
        assert!(storage.load_plan(GUEST_OWNER, d2).unwrap().is_empty());
    }

    #[test]
    fn test_overwrite_and_remove() {
        let (_dir, storage) = storage();
        let stats = Stats {
            score: 40,
            streak: 2,
            last_active: Utc::now(),
        };
        storage.save_stats("u1", &stats).unwrap();
        storage
            .save_stats("u1", &Stats { score: 55, ..stats })
            .unwrap();
        assert_eq!(storage.load_stats("u1").unwrap().map(|s| s.score), Some(55));
        assert!(storage.load_stats("u2").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_blob_is_a_storage_error() {
        let (dir, storage) = storage();
        std::fs::write(dir.path().join("goals_u1.json"), "{not json").unwrap();
        assert!(matches!(storage.load_goals("u1"), Err(AppError::Storage(_))));
    }
}
