use std::future::Future;
use std::str::FromStr;

use askmike_types::Visibility;

use super::dao::{Chat, NewChat};
use super::{SqliteStore, from_db_time, now, to_db_time};

pub trait ChatStore: Send + Sync + 'static {
    /// Insert `chat` unless its id is taken, then return the stored row.
    ///
    /// The returned chat may belong to another user when the id already
    /// existed; callers must check ownership.
    fn create_chat_if_absent(
        &self,
        chat: NewChat,
    ) -> impl Future<Output = Result<Chat, sqlx::Error>> + Send;

    fn get_chat(&self, id: &str) -> impl Future<Output = Result<Option<Chat>, sqlx::Error>> + Send;

    /// Chats owned by `user_id`, newest first.
    fn list_chats_by_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<Chat>, sqlx::Error>> + Send;

    fn set_visibility(
        &self,
        id: &str,
        visibility: Visibility,
    ) -> impl Future<Output = Result<Option<Chat>, sqlx::Error>> + Send;

    /// Delete the chat and its messages in one transaction.
    /// Returns `false` when no such chat existed.
    fn delete_chat(&self, id: &str) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

type ChatRow = (String, String, String, String, String, String);

const CHAT_COLUMNS: &str = "id, user_id, title, visibility, created_at, updated_at";

fn chat_from_row((id, user_id, title, visibility, created_at, updated_at): ChatRow) -> Result<Chat, sqlx::Error> {
    let visibility = Visibility::from_str(&visibility).unwrap_or_else(|_| {
        tracing::warn!(chat_id = %id, raw = %visibility, "unknown chat visibility; treating as private");
        Visibility::Private
    });
    Ok(Chat {
        id,
        user_id,
        title,
        visibility,
        created_at: from_db_time(&created_at, "created_at")?,
        updated_at: from_db_time(&updated_at, "updated_at")?,
    })
}

impl ChatStore for SqliteStore {
    async fn create_chat_if_absent(&self, chat: NewChat) -> Result<Chat, sqlx::Error> {
        let ts = to_db_time(now());
        let inserted = sqlx::query(
            "INSERT INTO chats (id, user_id, title, visibility, created_at, updated_at) \
             VALUES (?1, ?2, ?3, 'private', ?4, ?4) ON CONFLICT(id) DO NOTHING",
        )
        .bind(&chat.id)
        .bind(&chat.user_id)
        .bind(&chat.title)
        .bind(&ts)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if inserted > 0 {
            tracing::info!(chat_id = %chat.id, user_id = %chat.user_id, "chat created");
        }

        self.get_chat(&chat.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    async fn get_chat(&self, id: &str) -> Result<Option<Chat>, sqlx::Error> {
        let sql = format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1");
        let row: Option<ChatRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(chat_from_row).transpose()
    }

    async fn list_chats_by_user(&self, user_id: &str) -> Result<Vec<Chat>, sqlx::Error> {
        let sql = format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE user_id = ?1 \
             ORDER BY created_at DESC, rowid DESC"
        );
        let rows: Vec<ChatRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(chat_from_row).collect()
    }

    async fn set_visibility(
        &self,
        id: &str,
        visibility: Visibility,
    ) -> Result<Option<Chat>, sqlx::Error> {
        let sql = format!(
            "UPDATE chats SET visibility = ?1, updated_at = ?2 WHERE id = ?3 \
             RETURNING {CHAT_COLUMNS}"
        );
        let row: Option<ChatRow> = sqlx::query_as(&sql)
            .bind(visibility.as_ref())
            .bind(to_db_time(now()))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(chat_from_row).transpose()
    }

    async fn delete_chat(&self, id: &str) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let messages = sqlx::query("DELETE FROM messages WHERE chat_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let chats = sqlx::query("DELETE FROM chats WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        tracing::info!(chat_id = %id, messages, "chat deleted");
        Ok(chats > 0)
    }
}
