use crate::error::{AppError, Result};
use crate::models::{ChatMessage, DailyLogEntry, DailyPlan, Goal, Habit, Stats, User};
use chrono::NaiveDate;
use dirs::data_dir;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::PathBuf;

use super::operations;

/// Remote store. Every query is keyed by user id.
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Opens the database at `database_url`, or at the default file under the
    /// platform data dir when no URL is configured.
    pub async fn connect(database_url: Option<&str>) -> Result<Self> {
        let db_url = match database_url {
            Some(url) => url.to_string(),
            None => {
                let db_path = Self::default_db_path()?;
                if let Some(parent) = db_path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        AppError::Database(format!("Failed to create database directory: {}", e))
                    })?;
                }
                format!("sqlite:{}?mode=rwc", db_path.display())
            }
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to database: {}", e)))?;

        let db = Self { pool };
        db.create_tables().await?;

        Ok(db)
    }

    /// Single-connection in-memory database. Each pool gets its own copy.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| AppError::Database(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self { pool };
        db.create_tables().await?;

        Ok(db)
    }

    #[cfg(test)]
    pub(crate) async fn close(&self) {
        self.pool.close().await;
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = data_dir()
            .ok_or_else(|| AppError::Database("Could not find data directory".to_string()))?;
        Ok(data_dir.join("antigravity").join("antigravity.db"))
    }

    async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                picture TEXT NOT NULL,
                is_premium BOOLEAN NOT NULL DEFAULT 0,
                trial_ends_at TEXT,
                is_trial_used BOOLEAN NOT NULL DEFAULT 0,
                momentum_score INTEGER NOT NULL DEFAULT 0,
                streak INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create users table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stats (
                user_id TEXT PRIMARY KEY NOT NULL,
                score INTEGER NOT NULL,
                streak INTEGER NOT NULL,
                last_active TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create stats table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS habits (
                id TEXT PRIMARY KEY NOT NULL,
                user_id TEXT NOT NULL,
                text TEXT NOT NULL,
                completed BOOLEAN NOT NULL DEFAULT 0,
                streak INTEGER NOT NULL DEFAULT 0,
                target_quantity INTEGER,
                quantity INTEGER,
                unit TEXT,
                last_completed_date TEXT,
                created_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create habits table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_habits_user_id ON habits(user_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create habits index: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS goals (
                id TEXT PRIMARY KEY NOT NULL,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                category TEXT NOT NULL,
                term TEXT NOT NULL,
                target_date TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                smart TEXT NOT NULL,
                target_number REAL,
                current_number REAL,
                unit TEXT,
                created_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create goals table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_goals_user_id ON goals(user_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create goals index: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_logs (
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                reflection TEXT NOT NULL,
                energy INTEGER NOT NULL,
                mood TEXT NOT NULL,
                productivity_score INTEGER NOT NULL,
                impact_score INTEGER NOT NULL,
                did_today_count BOOLEAN NOT NULL,
                report TEXT NOT NULL,
                schedule TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, date)
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create daily_logs table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_plans (
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                events TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, date)
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create daily_plans table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY NOT NULL,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                last_message_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create conversations table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY NOT NULL,
                conversation_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create messages table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_user_created ON messages(user_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create messages index: {}", e)))?;

        Ok(())
    }

    // Users
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        operations::users::get_user(&self.pool, user_id).await
    }

    pub async fn insert_user(&self, user: &User) -> Result<()> {
        operations::users::insert_user(&self.pool, user).await
    }

    // Stats
    pub async fn get_stats(&self, user_id: &str) -> Result<Option<Stats>> {
        operations::stats::get_stats(&self.pool, user_id).await
    }

    pub async fn upsert_stats(&self, user_id: &str, stats: &Stats) -> Result<()> {
        operations::stats::upsert_stats(&self.pool, user_id, stats).await
    }

    // Habits
    pub async fn list_habits(&self, user_id: &str) -> Result<Vec<Habit>> {
        operations::habits::list_habits(&self.pool, user_id).await
    }

    pub async fn add_habit(&self, habit: &Habit, free_limit: usize) -> Result<()> {
        operations::habits::add_habit(&self.pool, habit, free_limit).await
    }

    pub async fn update_habit(&self, habit: &Habit) -> Result<()> {
        operations::habits::update_habit(&self.pool, habit).await
    }

    pub async fn update_habits(&self, habits: &[Habit]) -> Result<()> {
        for habit in habits {
            operations::habits::update_habit(&self.pool, habit).await?;
        }
        Ok(())
    }

    pub async fn delete_habit(&self, user_id: &str, habit_id: &str) -> Result<()> {
        operations::habits::delete_habit(&self.pool, user_id, habit_id).await
    }

    // Goals
    pub async fn list_goals(&self, user_id: &str) -> Result<Vec<Goal>> {
        operations::goals::list_goals(&self.pool, user_id).await
    }

    pub async fn save_goal(&self, goal: &Goal) -> Result<()> {
        operations::goals::save_goal(&self.pool, goal).await
    }

    pub async fn delete_goal(&self, user_id: &str, goal_id: &str) -> Result<()> {
        operations::goals::delete_goal(&self.pool, user_id, goal_id).await
    }

    // Daily logs
    pub async fn upsert_daily_log(&self, entry: &DailyLogEntry) -> Result<()> {
        operations::daily_logs::upsert_daily_log(&self.pool, entry).await
    }

    pub async fn get_daily_log(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyLogEntry>> {
        operations::daily_logs::get_daily_log(&self.pool, user_id, date).await
    }

    pub async fn list_daily_logs(&self, user_id: &str) -> Result<Vec<DailyLogEntry>> {
        operations::daily_logs::list_daily_logs(&self.pool, user_id).await
    }

    // Daily plans
    pub async fn get_daily_plan(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailyPlan>> {
        operations::daily_plans::get_daily_plan(&self.pool, user_id, date).await
    }

    pub async fn upsert_daily_plan(&self, plan: &DailyPlan) -> Result<()> {
        operations::daily_plans::upsert_daily_plan(&self.pool, plan).await
    }

    // Chat
    pub async fn save_message(&self, user_id: &str, message: &ChatMessage) -> Result<()> {
        operations::messages::save_message(&self.pool, user_id, message).await
    }

    pub async fn list_messages(&self, user_id: &str) -> Result<Vec<ChatMessage>> {
        operations::messages::list_messages(&self.pool, user_id).await
    }
}
