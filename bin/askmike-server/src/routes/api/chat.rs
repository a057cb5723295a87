//! Chat routes: streaming turns, retrieval, deletion, visibility and
//! trailing-message deletion.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, post};
use axum::{Json, Router};
use futures::StreamExt;
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

use crate::auth::Identity;
use crate::entities::{Chat, ChatStore, Message, MessageStore};
use crate::error::ServerError;
use crate::routes::extract::ApiJson;
use crate::schemas::DeleteResponse;
use crate::schemas::IdQuery;
use crate::schemas::chat::{ChatRequest, ChatWithMessages, IncomingMessage, VisibilityUpdate};
use crate::services::chat::{owned_chat, readable_chat, start_turn};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(post_chat, get_chat, delete_chat, patch_chat, delete_trailing_messages),
    components(schemas(
        ChatRequest,
        IncomingMessage,
        ChatWithMessages,
        VisibilityUpdate,
        DeleteResponse,
        Chat,
        Message,
        askmike_types::StreamEvent,
        askmike_types::Visibility
    ))
)]
pub struct ChatApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/chat",
            post(post_chat)
                .get(get_chat)
                .delete(delete_chat)
                .patch(patch_chat),
        )
        .route("/chat/messages", delete(delete_trailing_messages))
}

/// Run one chat turn and stream it back as server-sent events.
///
/// Events are JSON objects tagged by `type`: `user-message-id` first, then
/// `text-delta` chunks, then `finish` (the reply is stored) or `error`.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Event stream of the turn", content_type = "text/event-stream", body = askmike_types::StreamEvent),
        (status = 400, description = "Missing id, empty messages or no user message"),
        (status = 401, description = "Invalid token or chat owned by another user"),
        (status = 500, description = "Storage or upstream failure"),
    ),
    security(("bearer" = []))
)]
pub async fn post_chat(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Response, ServerError> {
    req.validate()?;
    info!(chat_id = %req.id, user_id = %identity.id, messages = req.messages.len(), "chat request");

    let events = start_turn(state, &identity, req).await?;
    let sse = events.map(|event| Event::default().json_data(event));
    Ok(Sse::new(sse).keep_alive(KeepAlive::default()).into_response())
}

/// Fetch a chat with its messages in conversation order.
#[utoipa::path(
    get,
    path = "/api/chat",
    tag = "chat",
    params(IdQuery),
    responses(
        (status = 200, description = "Chat and messages", body = ChatWithMessages),
        (status = 400, description = "Missing id"),
        (status = 401, description = "Private chat of another user"),
        (status = 404, description = "Unknown chat"),
    ),
    security(("bearer" = []))
)]
pub async fn get_chat(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<IdQuery>,
) -> Result<Json<ChatWithMessages>, ServerError> {
    let id = query.require()?;
    let chat = readable_chat(state.store.as_ref(), &id, &identity).await?;
    let messages = state.store.list_messages(&id).await?;
    Ok(Json(ChatWithMessages { chat, messages }))
}

/// Delete a chat and all of its messages (owner only).
#[utoipa::path(
    delete,
    path = "/api/chat",
    tag = "chat",
    params(IdQuery),
    responses(
        (status = 200, description = "Chat deleted", body = DeleteResponse),
        (status = 400, description = "Missing id"),
        (status = 401, description = "Not the owner"),
        (status = 404, description = "Unknown chat"),
    ),
    security(("bearer" = []))
)]
pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<IdQuery>,
) -> Result<Json<DeleteResponse>, ServerError> {
    let id = query.require()?;
    owned_chat(state.store.as_ref(), &id, &identity).await?;
    let deleted = state.store.delete_chat(&id).await?;
    Ok(Json(DeleteResponse {
        deleted: u64::from(deleted),
    }))
}

/// Change who may read a chat (owner only).
#[utoipa::path(
    patch,
    path = "/api/chat",
    tag = "chat",
    params(IdQuery),
    request_body = VisibilityUpdate,
    responses(
        (status = 200, description = "Updated chat", body = Chat),
        (status = 401, description = "Not the owner"),
        (status = 404, description = "Unknown chat"),
    ),
    security(("bearer" = []))
)]
pub async fn patch_chat(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<IdQuery>,
    ApiJson(update): ApiJson<VisibilityUpdate>,
) -> Result<Json<Chat>, ServerError> {
    let id = query.require()?;
    owned_chat(state.store.as_ref(), &id, &identity).await?;
    let chat = state
        .store
        .set_visibility(&id, update.visibility)
        .await?
        .ok_or_else(|| ServerError::NotFound("chat not found".into()))?;
    info!(chat_id = %id, visibility = %chat.visibility, "chat visibility changed");
    Ok(Json(chat))
}

/// Delete the referenced message and every later message of its chat.
///
/// Used by edit and retry flows.
#[utoipa::path(
    delete,
    path = "/api/chat/messages",
    tag = "chat",
    params(IdQuery),
    responses(
        (status = 200, description = "Messages deleted", body = DeleteResponse),
        (status = 401, description = "Not the owner"),
        (status = 404, description = "Unknown message"),
    ),
    security(("bearer" = []))
)]
pub async fn delete_trailing_messages(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<IdQuery>,
) -> Result<Json<DeleteResponse>, ServerError> {
    let id = query.require()?;
    let pivot = state
        .store
        .get_message(&id)
        .await?
        .ok_or_else(|| ServerError::NotFound("message not found".into()))?;
    let chat = owned_chat(state.store.as_ref(), &pivot.chat_id, &identity).await?;
    let deleted = state
        .store
        .delete_messages_from(&chat.id, pivot.created_at)
        .await?;
    info!(chat_id = %chat.id, deleted, "trailing messages deleted");
    Ok(Json(DeleteResponse { deleted }))
}
