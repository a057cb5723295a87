use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Serialize;
use utoipa::ToSchema;

use super::VerifiedClaims;
use crate::error::ServerError;

/// The authenticated caller, attached to the request by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Token subject; primary key of the caller's user row.
    pub id: String,
    pub wallet_address: Option<String>,
}

impl From<VerifiedClaims> for Identity {
    fn from(claims: VerifiedClaims) -> Self {
        Self {
            id: claims.sub,
            wallet_address: claims.wallet_address,
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| ServerError::Unauthorized("unauthenticated".into()))
    }
}
