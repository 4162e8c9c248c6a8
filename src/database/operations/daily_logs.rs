use crate::database::{format_date, parse_date, parse_timestamp};
use crate::error::{AppError, Result};
use crate::models::{DailyLogEntry, PlanEvent};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const SELECT_COLUMNS: &str = r#"
    SELECT user_id, date, reflection, energy, mood, productivity_score, impact_score,
           did_today_count, report, schedule, created_at, updated_at
    FROM daily_logs
"#;

/// One row per (user, date). A same-day resubmission overwrites everything
/// except `created_at`.
pub async fn upsert_daily_log(pool: &SqlitePool, entry: &DailyLogEntry) -> Result<()> {
    let schedule_json = serde_json::to_string(&entry.schedule)
        .map_err(|e| AppError::Database(format!("Failed to serialize schedule: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO daily_logs (user_id, date, reflection, energy, mood, productivity_score,
                                impact_score, did_today_count, report, schedule,
                                created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(user_id, date) DO UPDATE SET
            reflection = excluded.reflection,
            energy = excluded.energy,
            mood = excluded.mood,
            productivity_score = excluded.productivity_score,
            impact_score = excluded.impact_score,
            did_today_count = excluded.did_today_count,
            report = excluded.report,
            schedule = excluded.schedule,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&entry.user_id)
    .bind(format_date(entry.date))
    .bind(&entry.reflection)
    .bind(entry.energy as i64)
    .bind(&entry.mood)
    .bind(entry.productivity_score as i64)
    .bind(entry.impact_score as i64)
    .bind(entry.did_today_count)
    .bind(&entry.report)
    .bind(schedule_json)
    .bind(entry.created_at.to_rfc3339())
    .bind(entry.updated_at.to_rfc3339())
    .execute(pool)
    .await
    .map_err(|e| AppError::Database(format!("Failed to save daily log: {}", e)))?;

    Ok(())
}

pub async fn get_daily_log(
    pool: &SqlitePool,
    user_id: &str,
    date: NaiveDate,
) -> Result<Option<DailyLogEntry>> {
    let row = sqlx::query(&format!("{} WHERE user_id = ? AND date = ?", SELECT_COLUMNS))
        .bind(user_id)
        .bind(format_date(date))
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to fetch daily log: {}", e)))?;

    row.map(|row| entry_from_row(&row)).transpose()
}

/// Newest first.
pub async fn list_daily_logs(pool: &SqlitePool, user_id: &str) -> Result<Vec<DailyLogEntry>> {
    let rows = sqlx::query(&format!("{} WHERE user_id = ? ORDER BY date DESC", SELECT_COLUMNS))
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to fetch daily logs: {}", e)))?;

    rows.iter().map(entry_from_row).collect()
}

fn entry_from_row(row: &SqliteRow) -> Result<DailyLogEntry> {
    let schedule: Vec<PlanEvent> = serde_json::from_str(&row.get::<String, _>("schedule"))
        .map_err(|e| AppError::Database(format!("Failed to parse schedule: {}", e)))?;

    Ok(DailyLogEntry {
        user_id: row.get("user_id"),
        date: parse_date(&row.get::<String, _>("date"), "date")?,
        reflection: row.get("reflection"),
        energy: row.get::<i64, _>("energy").clamp(1, 5) as u8,
        mood: row.get("mood"),
        productivity_score: row.get::<i64, _>("productivity_score").clamp(0, 100) as u8,
        impact_score: row.get::<i64, _>("impact_score").clamp(0, 100) as u8,
        did_today_count: row.get("did_today_count"),
        report: row.get("report"),
        schedule,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"), "created_at")?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"), "updated_at")?,
    })
}
