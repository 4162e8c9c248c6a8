use crate::database::{format_date, parse_date, parse_timestamp};
use crate::error::{AppError, Result};
use crate::models::{Goal, GoalCategory, GoalTerm, SmartFields};
use sqlx::{Row, SqlitePool};

pub async fn save_goal(pool: &SqlitePool, goal: &Goal) -> Result<()> {
    let smart_json = serde_json::to_string(&goal.smart)
        .map_err(|e| AppError::Database(format!("Failed to serialize SMART fields: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO goals (id, user_id, title, category, term, target_date, progress, smart,
                           target_number, current_number, unit, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            category = excluded.category,
            term = excluded.term,
            target_date = excluded.target_date,
            progress = excluded.progress,
            smart = excluded.smart,
            target_number = excluded.target_number,
            current_number = excluded.current_number,
            unit = excluded.unit
    "#,
    )
    .bind(&goal.id)
    .bind(&goal.user_id)
    .bind(&goal.title)
    .bind(goal.category.to_string())
    .bind(goal.term.to_string())
    .bind(format_date(goal.target_date))
    .bind(goal.progress as i64)
    .bind(smart_json)
    .bind(goal.target_number)
    .bind(goal.current_number)
    .bind(&goal.unit)
    .bind(goal.created_at.to_rfc3339())
    .execute(pool)
    .await
    .map_err(|e| AppError::Database(format!("Failed to save goal: {}", e)))?;

    Ok(())
}

pub async fn list_goals(pool: &SqlitePool, user_id: &str) -> Result<Vec<Goal>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, title, category, term, target_date, progress, smart,
               target_number, current_number, unit, created_at
        FROM goals WHERE user_id = ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::Database(format!("Failed to fetch goals: {}", e)))?;

    let mut goals = Vec::new();
    for row in rows {
        let smart: SmartFields = serde_json::from_str(&row.get::<String, _>("smart"))
            .map_err(|e| AppError::Database(format!("Failed to parse SMART fields: {}", e)))?;
        let category: GoalCategory = row
            .get::<String, _>("category")
            .parse()
            .map_err(AppError::Database)?;
        let term: GoalTerm = row
            .get::<String, _>("term")
            .parse()
            .map_err(AppError::Database)?;

        goals.push(Goal {
            id: row.get("id"),
            user_id: row.get("user_id"),
            title: row.get("title"),
            category,
            term,
            target_date: parse_date(&row.get::<String, _>("target_date"), "target_date")?,
            progress: row.get::<i64, _>("progress").clamp(0, 100) as u8,
            smart,
            target_number: row.get("target_number"),
            current_number: row.get("current_number"),
            unit: row.get("unit"),
            created_at: parse_timestamp(&row.get::<String, _>("created_at"), "created_at")?,
        });
    }

    Ok(goals)
}

pub async fn delete_goal(pool: &SqlitePool, user_id: &str, goal_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM goals WHERE id = ? AND user_id = ?")
        .bind(goal_id)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to delete goal: {}", e)))?;

    Ok(())
}
