use crate::database::{format_date, parse_date};
use crate::error::{AppError, Result};
use crate::models::{DailyPlan, PlanEvent};
use chrono::{NaiveDate, Utc};
use sqlx::{Row, SqlitePool};

pub async fn get_daily_plan(
    pool: &SqlitePool,
    user_id: &str,
    date: NaiveDate,
) -> Result<Option<DailyPlan>> {
    let row = sqlx::query("SELECT user_id, date, events FROM daily_plans WHERE user_id = ? AND date = ?")
        .bind(user_id)
        .bind(format_date(date))
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to fetch daily plan: {}", e)))?;

    let Some(row) = row else {
        return Ok(None);
    };

    let events: Vec<PlanEvent> = serde_json::from_str(&row.get::<String, _>("events"))
        .map_err(|e| AppError::Database(format!("Failed to parse plan events: {}", e)))?;

    Ok(Some(DailyPlan::new(
        &row.get::<String, _>("user_id"),
        parse_date(&row.get::<String, _>("date"), "date")?,
        events,
    )))
}

/// Replaces the whole event list for (user, date).
pub async fn upsert_daily_plan(pool: &SqlitePool, plan: &DailyPlan) -> Result<()> {
    let events_json = serde_json::to_string(&plan.events)
        .map_err(|e| AppError::Database(format!("Failed to serialize plan events: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO daily_plans (user_id, date, events, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(user_id, date) DO UPDATE SET
            events = excluded.events,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&plan.user_id)
    .bind(format_date(plan.date))
    .bind(events_json)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .map_err(|e| AppError::Database(format!("Failed to save daily plan: {}", e)))?;

    Ok(())
}
