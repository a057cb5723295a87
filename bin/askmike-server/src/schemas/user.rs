use askmike_types::User;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::Identity;

/// Response body for `POST /api/user/sync`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SyncResponse {
    pub user: User,
}

/// Response body for `GET /api/protected`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProtectedResponse {
    pub message: String,
    pub user: Identity,
}
