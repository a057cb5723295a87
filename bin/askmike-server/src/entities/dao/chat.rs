use askmike_types::Visibility;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// A row in the `chats` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    /// Owning user; fixed at creation.
    pub user_id: String,
    pub title: String,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when a chat is created lazily on its first message.
#[derive(Debug, Clone)]
pub struct NewChat {
    pub id: String,
    pub user_id: String,
    pub title: String,
}

/// A row in the `messages` table.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    /// `"user"`, `"assistant"`, `"system"` or `"tool"`.
    pub role: String,
    /// A plain string or a multi-part array, stored as JSON text.
    #[schema(value_type = Object)]
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
