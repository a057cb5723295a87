use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Who may read a chat besides its owner.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

/// One server-sent event of a chat turn.
///
/// A turn always starts with [`StreamEvent::UserMessageId`] and ends with
/// either [`StreamEvent::Finish`] or [`StreamEvent::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// Id under which the caller's message was persisted.
    UserMessageId { content: String },
    /// An incremental chunk of the assistant reply.
    TextDelta { content: String },
    /// The assistant reply has been persisted under `message_id`.
    Finish {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    Error { message: String },
}
