use askmike_types::Visibility;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::{Chat, Message};

/// A message as sent by the browser. Client-side ids are ignored; the
/// server assigns its own on persistence.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IncomingMessage {
    pub role: String,
    /// A plain string or an array of content parts.
    #[schema(value_type = Object)]
    pub content: serde_json::Value,
}

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Client-generated chat id; the chat is created on first use.
    #[serde(default)]
    #[validate(length(min = 1, message = "missing chat id"))]
    pub id: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[validate(length(min = 1, message = "messages must not be empty"))]
    pub messages: Vec<IncomingMessage>,
}

impl ChatRequest {
    /// The most recent message with role `user`.
    pub fn latest_user_message(&self) -> Option<&IncomingMessage> {
        self.messages.iter().rev().find(|m| m.role == "user")
    }
}

/// Response body for `GET /api/chat`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatWithMessages {
    pub chat: Chat,
    pub messages: Vec<Message>,
}

/// Request body for `PATCH /api/chat`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VisibilityUpdate {
    pub visibility: Visibility,
}
