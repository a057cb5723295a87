use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use super::document::owned_versions;
use crate::auth::Identity;
use crate::entities::{DocumentStore, Suggestion};
use crate::error::ServerError;
use crate::schemas::document::SuggestionsQuery;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_suggestions), components(schemas(Suggestion)))]
pub struct SuggestionsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/suggestions", get(get_suggestions))
}

/// Suggestions attached to any version of a document the caller owns.
#[utoipa::path(
    get,
    path = "/api/suggestions",
    tag = "document",
    params(SuggestionsQuery),
    responses(
        (status = 200, description = "Suggestions", body = Vec<Suggestion>),
        (status = 400, description = "Missing documentId"),
        (status = 401, description = "Not the owner"),
        (status = 404, description = "Unknown document"),
    ),
    security(("bearer" = []))
)]
pub async fn get_suggestions(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<SuggestionsQuery>,
) -> Result<Json<Vec<Suggestion>>, ServerError> {
    let document_id = query
        .document_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ServerError::BadRequest("missing documentId".into()))?;
    owned_versions(state.store.as_ref(), &document_id, &identity).await?;
    Ok(Json(state.store.list_suggestions(&document_id).await?))
}
