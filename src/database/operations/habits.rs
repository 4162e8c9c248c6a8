use crate::database::{format_date, parse_date, parse_timestamp};
use crate::error::{AppError, Result};
use crate::models::Habit;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::users;

pub async fn list_habits(pool: &SqlitePool, user_id: &str) -> Result<Vec<Habit>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, text, completed, streak, target_quantity, quantity, unit,
               last_completed_date, created_at
        FROM habits WHERE user_id = ?
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::Database(format!("Failed to fetch habits: {}", e)))?;

    let mut habits = Vec::new();
    for row in rows {
        let last_completed_date = match row.get::<Option<String>, _>("last_completed_date") {
            Some(value) => Some(parse_date(&value, "last_completed_date")?),
            None => None,
        };

        habits.push(Habit {
            id: row.get("id"),
            user_id: row.get("user_id"),
            text: row.get("text"),
            completed: row.get("completed"),
            streak: row.get::<i64, _>("streak").max(0) as u32,
            target_quantity: row.get::<Option<i64>, _>("target_quantity").map(|q| q.max(0) as u32),
            quantity: row.get::<Option<i64>, _>("quantity").map(|q| q.max(0) as u32),
            unit: row.get("unit"),
            last_completed_date,
            created_at: parse_timestamp(&row.get::<String, _>("created_at"), "created_at")?,
        });
    }

    Ok(habits)
}

/// Inserts a habit, rejecting it when a non-premium user already holds
/// `free_limit` habits. The count and the insert share one transaction.
pub async fn add_habit(pool: &SqlitePool, habit: &Habit, free_limit: usize) -> Result<()> {
    let premium = users::get_user(pool, &habit.user_id)
        .await?
        .map(|user| user.has_premium(Utc::now()))
        .unwrap_or(false);

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

    if !premium {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM habits WHERE user_id = ?")
            .bind(&habit.user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("Failed to count habits: {}", e)))?;

        if count as usize >= free_limit {
            return Err(AppError::HabitLimitReached { limit: free_limit });
        }
    }

    save_habit(&mut *tx, habit).await?;

    tx.commit()
        .await
        .map_err(|e| AppError::Database(format!("Failed to commit habit: {}", e)))?;

    Ok(())
}

pub async fn update_habit(pool: &SqlitePool, habit: &Habit) -> Result<()> {
    save_habit(pool, habit).await
}

async fn save_habit<'e, E>(executor: E, habit: &Habit) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO habits (id, user_id, text, completed, streak, target_quantity, quantity,
                            unit, last_completed_date, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(id) DO UPDATE SET
            text = excluded.text,
            completed = excluded.completed,
            streak = excluded.streak,
            target_quantity = excluded.target_quantity,
            quantity = excluded.quantity,
            unit = excluded.unit,
            last_completed_date = excluded.last_completed_date
        "#,
    )
    .bind(&habit.id)
    .bind(&habit.user_id)
    .bind(&habit.text)
    .bind(habit.completed)
    .bind(habit.streak as i64)
    .bind(habit.target_quantity.map(|q| q as i64))
    .bind(habit.quantity.map(|q| q as i64))
    .bind(&habit.unit)
    .bind(habit.last_completed_date.map(format_date))
    .bind(habit.created_at.to_rfc3339())
    .execute(executor)
    .await
    .map_err(|e| AppError::Database(format!("Failed to save habit: {}", e)))?;

    Ok(())
}

pub async fn delete_habit(pool: &SqlitePool, user_id: &str, habit_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM habits WHERE id = ? AND user_id = ?")
        .bind(habit_id)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to delete habit: {}", e)))?;

    Ok(())
}
