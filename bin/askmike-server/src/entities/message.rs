use std::future::Future;

use chrono::{DateTime, Utc};

use super::dao::Message;
use super::{SqliteStore, from_db_time, to_db_time};

pub trait MessageStore: Send + Sync + 'static {
    fn append_message(&self, msg: Message) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Messages of a chat in conversation order.
    fn list_messages(
        &self,
        chat_id: &str,
    ) -> impl Future<Output = Result<Vec<Message>, sqlx::Error>> + Send;

    fn get_message(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Message>, sqlx::Error>> + Send;

    /// Delete every message of `chat_id` created at or after `from`.
    fn delete_messages_from(
        &self,
        chat_id: &str,
        from: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

type MessageRow = (String, String, String, String, String);

fn message_from_row((id, chat_id, role, content, created_at): MessageRow) -> Result<Message, sqlx::Error> {
    // Rows written by older clients may hold bare text instead of JSON.
    let content = serde_json::from_str(&content).unwrap_or(serde_json::Value::String(content));
    Ok(Message {
        id,
        chat_id,
        role,
        content,
        created_at: from_db_time(&created_at, "created_at")?,
    })
}

impl MessageStore for SqliteStore {
    async fn append_message(&self, msg: Message) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO messages (id, chat_id, role, content, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&msg.id)
        .bind(&msg.chat_id)
        .bind(&msg.role)
        .bind(msg.content.to_string())
        .bind(to_db_time(msg.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, sqlx::Error> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, chat_id, role, content, created_at \
             FROM messages WHERE chat_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(message_from_row).collect()
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>, sqlx::Error> {
        let row: Option<MessageRow> = sqlx::query_as(
            "SELECT id, chat_id, role, content, created_at FROM messages WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(message_from_row).transpose()
    }

    async fn delete_messages_from(
        &self,
        chat_id: &str,
        from: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM messages WHERE chat_id = ?1 AND created_at >= ?2")
            .bind(chat_id)
            .bind(to_db_time(from))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
