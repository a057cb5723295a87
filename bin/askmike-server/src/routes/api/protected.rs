use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::auth::Identity;
use crate::schemas::user::ProtectedResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_protected), components(schemas(ProtectedResponse, Identity)))]
pub struct ProtectedApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/protected", get(get_protected))
}

/// Echo the authenticated identity.
#[utoipa::path(
    get,
    path = "/api/protected",
    tag = "user",
    responses((status = 200, description = "Caller identity", body = ProtectedResponse)),
    security(("bearer" = []))
)]
pub async fn get_protected(identity: Identity) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        message: "This is a protected route".into(),
        user: identity,
    })
}
