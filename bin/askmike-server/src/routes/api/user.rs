use std::sync::Arc;

use askmike_types::UserAttributes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::auth::Identity;
use crate::entities::UserStore;
use crate::error::{ServerError, map_unique_violation};
use crate::routes::extract::ApiJson;
use crate::schemas::user::SyncResponse;
use crate::services::users::sync_attributes;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(sync_user),
    components(schemas(UserAttributes, SyncResponse, askmike_types::User))
)]
pub struct UserApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/user/sync", post(sync_user))
}

/// Create or update the caller's user row from wallet-provider attributes.
///
/// Only supplied fields are written; omitted ones keep their stored value.
#[utoipa::path(
    post,
    path = "/api/user/sync",
    tag = "user",
    request_body = UserAttributes,
    responses(
        (status = 200, description = "Synced user", body = SyncResponse),
        (status = 401, description = "Body id differs from the token subject"),
        (status = 409, description = "Email already used by another user"),
    ),
    security(("bearer" = []))
)]
pub async fn sync_user(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    ApiJson(attrs): ApiJson<UserAttributes>,
) -> Result<Json<SyncResponse>, ServerError> {
    let attrs = sync_attributes(&identity, attrs)?;
    let user = state
        .store
        .upsert_user(attrs)
        .await
        .map_err(|e| map_unique_violation(e, "email"))?;
    info!(user_id = %user.id, "user synced");
    Ok(Json(SyncResponse { user }))
}
