use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::auth::Identity;
use crate::entities::{Chat, ChatStore};
use crate::error::ServerError;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_history))]
pub struct HistoryApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/history", get(get_history))
}

/// The caller's chats, newest first.
#[utoipa::path(
    get,
    path = "/api/history",
    tag = "chat",
    responses((status = 200, description = "Chats owned by the caller", body = Vec<Chat>)),
    security(("bearer" = []))
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<Chat>>, ServerError> {
    Ok(Json(state.store.list_chats_by_user(&identity.id).await?))
}
