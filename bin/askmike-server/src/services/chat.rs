//! Chat turn orchestration.
//!
//! A turn moves through `Authenticated → ChatResolved → MessagePersisted →
//! Streaming → Completed | Failed`. Everything up to `MessagePersisted` runs
//! inside the request and fails it with a proper status. Streaming runs in a
//! spawned task that feeds [`StreamEvent`]s to the response through a
//! channel. The assistant reply is persisted before `finish` is sent, so a
//! finished stream always corresponds to a stored assistant message.

use std::sync::Arc;

use askmike_types::{StreamEvent, Visibility};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::auth::Identity;
use crate::entities::{Chat, ChatStore, Message, MessageStore, NewChat, now};
use crate::error::ServerError;
use crate::llm::{CompletionRequest, PromptMessage, resolve_model};
use crate::schemas::chat::ChatRequest;
use crate::services::users::ensure_user;
use crate::state::AppState;

/// Longest title derived from a first message, in characters.
const TITLE_MAX_CHARS: usize = 100;

const FALLBACK_TITLE: &str = "New chat";

/// Chat title for a message: its first 100 characters when it is plain text.
pub fn derive_title(content: &serde_json::Value) -> String {
    match content.as_str() {
        Some(text) if !text.trim().is_empty() => text.chars().take(TITLE_MAX_CHARS).collect(),
        _ => FALLBACK_TITLE.to_owned(),
    }
}

/// Load chat `id` and require the caller to own it.
pub async fn owned_chat(
    store: &impl ChatStore,
    id: &str,
    identity: &Identity,
) -> Result<Chat, ServerError> {
    let chat = store
        .get_chat(id)
        .await?
        .ok_or_else(|| ServerError::NotFound("chat not found".into()))?;
    if chat.user_id != identity.id {
        warn!(chat_id = %id, user_id = %identity.id, "chat access denied");
        return Err(ServerError::Unauthorized("not the owner of this chat".into()));
    }
    Ok(chat)
}

/// Load chat `id` for reading: the owner, or anyone when it is public.
pub async fn readable_chat(
    store: &impl ChatStore,
    id: &str,
    identity: &Identity,
) -> Result<Chat, ServerError> {
    let chat = store
        .get_chat(id)
        .await?
        .ok_or_else(|| ServerError::NotFound("chat not found".into()))?;
    if chat.user_id != identity.id && chat.visibility != Visibility::Public {
        warn!(chat_id = %id, user_id = %identity.id, "chat read denied");
        return Err(ServerError::Unauthorized("not the owner of this chat".into()));
    }
    Ok(chat)
}

/// Resolve the chat, persist the user message, and start streaming.
///
/// Returns the event stream of the response. The first event is always
/// [`StreamEvent::UserMessageId`].
pub async fn start_turn(
    state: Arc<AppState>,
    identity: &Identity,
    req: ChatRequest,
) -> Result<UnboundedReceiverStream<StreamEvent>, ServerError> {
    let latest = req
        .latest_user_message()
        .ok_or_else(|| ServerError::BadRequest("no user message found".into()))?;

    // ── ChatResolved ──────────────────────────────────────────────────────────
    ensure_user(state.store.as_ref(), identity).await?;
    let chat = state
        .store
        .create_chat_if_absent(NewChat {
            id: req.id.clone(),
            user_id: identity.id.clone(),
            title: derive_title(&latest.content),
        })
        .await?;
    if chat.user_id != identity.id {
        warn!(chat_id = %chat.id, user_id = %identity.id, "chat belongs to another user");
        return Err(ServerError::Unauthorized("not the owner of this chat".into()));
    }

    // ── MessagePersisted ──────────────────────────────────────────────────────
    let user_message_id = Uuid::new_v4().to_string();
    state
        .store
        .append_message(Message {
            id: user_message_id.clone(),
            chat_id: chat.id.clone(),
            role: "user".into(),
            content: latest.content.clone(),
            created_at: now(),
        })
        .await?;

    let model = resolve_model(&state.models, req.model_id.as_deref())
        .ok_or_else(|| ServerError::Internal("model catalog is empty".into()))?;
    let completion = CompletionRequest {
        model: model.api_identifier.clone(),
        system: state.system_prompt.to_string(),
        messages: req
            .messages
            .into_iter()
            .map(|m| PromptMessage {
                role: m.role,
                content: m.content,
            })
            .collect(),
    };
    info!(chat_id = %chat.id, model = %completion.model, "chat turn started");

    // ── Streaming ─────────────────────────────────────────────────────────────
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(StreamEvent::UserMessageId {
        content: user_message_id,
    });

    let span = info_span!("chat_turn", chat_id = %chat.id);
    tokio::spawn(run_completion(state, chat.id, completion, tx).instrument(span));

    Ok(UnboundedReceiverStream::new(rx))
}

/// Drive the completion to its end, persist the reply, then report.
///
/// Runs to completion even when the client has gone away; sends to a closed
/// channel are ignored.
async fn run_completion(
    state: Arc<AppState>,
    chat_id: String,
    completion: CompletionRequest,
    tx: mpsc::UnboundedSender<StreamEvent>,
) {
    let delta_tx = tx.clone();
    let result = state
        .provider
        .complete_stream(&completion, &move |content| {
            let _ = delta_tx.send(StreamEvent::TextDelta { content });
        })
        .await;

    let text = match result {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, "completion failed");
            let _ = tx.send(StreamEvent::Error {
                message: "completion failed".into(),
            });
            return;
        }
    };

    let assistant = Message {
        id: Uuid::new_v4().to_string(),
        chat_id,
        role: "assistant".into(),
        content: serde_json::Value::String(text),
        created_at: now(),
    };
    let message_id = assistant.id.clone();

    match state.store.append_message(assistant).await {
        Ok(()) => {
            info!(message_id = %message_id, "assistant message saved");
            let _ = tx.send(StreamEvent::Finish { message_id });
        }
        Err(e) => {
            error!(error = %e, "failed to save assistant message");
            let _ = tx.send(StreamEvent::Error {
                message: "failed to save assistant reply".into(),
            });
        }
    }
}
