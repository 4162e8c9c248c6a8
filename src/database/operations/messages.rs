use crate::database::parse_timestamp;
use crate::error::{AppError, Result};
use crate::models::{ChatConversation, ChatMessage, ChatRole};
use sqlx::{Row, SqlitePool};

/// Returns the user's coaching conversation, creating it on first use.
pub async fn get_or_create_conversation(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<ChatConversation> {
    let row = sqlx::query(
        "SELECT id, user_id, title, last_message_at FROM conversations WHERE user_id = ? LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::Database(format!("Failed to fetch conversation: {}", e)))?;

    if let Some(row) = row {
        return Ok(ChatConversation {
            id: row.get("id"),
            user_id: row.get("user_id"),
            title: row.get("title"),
            last_message_at: parse_timestamp(
                &row.get::<String, _>("last_message_at"),
                "last_message_at",
            )?,
        });
    }

    let conversation = ChatConversation::new(user_id, "Coach".to_string());
    sqlx::query(
        "INSERT INTO conversations (id, user_id, title, last_message_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&conversation.id)
    .bind(&conversation.user_id)
    .bind(&conversation.title)
    .bind(conversation.last_message_at.to_rfc3339())
    .execute(pool)
    .await
    .map_err(|e| AppError::Database(format!("Failed to create conversation: {}", e)))?;

    Ok(conversation)
}

pub async fn save_message(pool: &SqlitePool, user_id: &str, message: &ChatMessage) -> Result<()> {
    let conversation = get_or_create_conversation(pool, user_id).await?;

    sqlx::query(
        r#"
        INSERT INTO messages (id, conversation_id, user_id, role, content, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(&message.id)
    .bind(&conversation.id)
    .bind(user_id)
    .bind(message.role.to_string())
    .bind(&message.content)
    .bind(message.created_at.to_rfc3339())
    .execute(pool)
    .await
    .map_err(|e| AppError::Database(format!("Failed to save message: {}", e)))?;

    sqlx::query("UPDATE conversations SET last_message_at = ? WHERE id = ?")
        .bind(message.created_at.to_rfc3339())
        .bind(&conversation.id)
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to update conversation: {}", e)))?;

    Ok(())
}

/// Oldest first.
pub async fn list_messages(pool: &SqlitePool, user_id: &str) -> Result<Vec<ChatMessage>> {
    let rows = sqlx::query(
        r#"
        SELECT id, role, content, created_at
        FROM messages WHERE user_id = ?
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::Database(format!("Failed to fetch messages: {}", e)))?;

    let mut messages = Vec::new();
    for row in rows {
        let role: ChatRole = row
            .get::<String, _>("role")
            .parse()
            .map_err(AppError::Database)?;

        messages.push(ChatMessage {
            id: row.get("id"),
            role,
            content: row.get("content"),
            created_at: parse_timestamp(&row.get::<String, _>("created_at"), "created_at")?,
        });
    }

    Ok(messages)
}
