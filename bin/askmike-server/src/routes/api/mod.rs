pub mod chat;
pub mod document;
pub mod files;
pub mod history;
pub mod models;
pub mod protected;
pub mod suggestions;
pub mod user;

use std::sync::Arc;

use axum::{Router, middleware};
use utoipa::OpenApi;

use crate::middleware::auth::require_identity;
use crate::state::AppState;

/// Routes nested under `/api`; every one requires a bearer token.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(chat::router())
        .merge(user::router())
        .merge(history::router())
        .merge(document::router())
        .merge(suggestions::router())
        .merge(files::router(state.config.max_upload_bytes))
        .merge(protected::router())
        .merge(models::router())
        .route_layer(middleware::from_fn_with_state(state, require_identity))
}

/// OpenAPI paths and schemas of every `/api` route.
pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut doc = chat::ChatApi::openapi();
    doc.merge(user::UserApi::openapi());
    doc.merge(history::HistoryApi::openapi());
    doc.merge(document::DocumentApi::openapi());
    doc.merge(suggestions::SuggestionsApi::openapi());
    doc.merge(files::FilesApi::openapi());
    doc.merge(protected::ProtectedApi::openapi());
    doc.merge(models::ModelsApi::openapi());
    doc
}
