use crate::database::parse_timestamp;
use crate::error::{AppError, Result};
use crate::models::Stats;
use sqlx::{Row, SqlitePool};

pub async fn get_stats(pool: &SqlitePool, user_id: &str) -> Result<Option<Stats>> {
    let row = sqlx::query("SELECT score, streak, last_active FROM stats WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to fetch stats: {}", e)))?;

    match row {
        Some(row) => Ok(Some(Stats {
            score: row.get::<i64, _>("score").clamp(0, 100) as u8,
            streak: row.get::<i64, _>("streak").max(0) as u32,
            last_active: parse_timestamp(&row.get::<String, _>("last_active"), "last_active")?,
        })),
        None => Ok(None),
    }
}

/// Writes the stats row and mirrors score and streak onto the user record.
pub async fn upsert_stats(pool: &SqlitePool, user_id: &str, stats: &Stats) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO stats (user_id, score, streak, last_active)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(user_id) DO UPDATE SET
            score = excluded.score,
            streak = excluded.streak,
            last_active = excluded.last_active
        "#,
    )
    .bind(user_id)
    .bind(stats.score as i64)
    .bind(stats.streak as i64)
    .bind(stats.last_active.to_rfc3339())
    .execute(pool)
    .await
    .map_err(|e| AppError::Database(format!("Failed to save stats: {}", e)))?;

    sqlx::query("UPDATE users SET momentum_score = ?, streak = ? WHERE user_id = ?")
        .bind(stats.score as i64)
        .bind(stats.streak as i64)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to update user momentum: {}", e)))?;

    Ok(())
}
