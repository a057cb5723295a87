use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::llm::ModelInfo;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(list_models), components(schemas(ModelInfo)))]
pub struct ModelsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/models", get(list_models))
}

/// Models accepted as `modelId`; the first is the default.
#[utoipa::path(
    get,
    path = "/api/models",
    tag = "chat",
    responses((status = 200, description = "Model catalog", body = Vec<ModelInfo>)),
    security(("bearer" = []))
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Vec<ModelInfo>> {
    Json(state.models.as_ref().clone())
}
