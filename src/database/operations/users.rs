use crate::database::parse_timestamp;
use crate::error::{AppError, Result};
use crate::models::User;
use sqlx::{Row, SqlitePool};

pub async fn get_user(pool: &SqlitePool, user_id: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT user_id, name, email, picture, is_premium, trial_ends_at, is_trial_used,
               momentum_score, streak, created_at
        FROM users WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::Database(format!("Failed to fetch user: {}", e)))?;

    let Some(row) = row else {
        return Ok(None);
    };

    let trial_ends_at = match row.get::<Option<String>, _>("trial_ends_at") {
        Some(value) => Some(parse_timestamp(&value, "trial_ends_at")?),
        None => None,
    };

    Ok(Some(User {
        user_id: row.get("user_id"),
        name: row.get("name"),
        email: row.get("email"),
        picture: row.get("picture"),
        is_premium: row.get("is_premium"),
        trial_ends_at,
        is_trial_used: row.get("is_trial_used"),
        momentum_score: row.get::<i64, _>("momentum_score").clamp(0, 100) as u8,
        streak: row.get::<i64, _>("streak").max(0) as u32,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"), "created_at")?,
    }))
}

/// Inserts a new user. An existing row for the same id is left untouched.
pub async fn insert_user(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (
            user_id, name, email, picture, is_premium, trial_ends_at, is_trial_used,
            momentum_score, streak, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO NOTHING
        "#,
    )
    .bind(&user.user_id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.picture)
    .bind(user.is_premium)
    .bind(user.trial_ends_at.map(|dt| dt.to_rfc3339()))
    .bind(user.is_trial_used)
    .bind(user.momentum_score as i64)
    .bind(user.streak as i64)
    .bind(user.created_at.to_rfc3339())
    .execute(pool)
    .await
    .map_err(|e| AppError::Database(format!("Failed to insert user: {}", e)))?;

    Ok(())
}
