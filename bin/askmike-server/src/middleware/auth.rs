use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use crate::auth::{AuthError, Identity, bearer_token, token_prefix};
use crate::error::ServerError;
use crate::state::AppState;

/// Authenticate every `/api` request with its bearer JWT.
///
/// On success the caller's [`Identity`] is attached to the request
/// extensions for handlers to extract.
pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let path = req.uri().path().to_owned();
    let token = match bearer_token(req.headers()) {
        Ok(token) => token.to_owned(),
        Err(e) => {
            warn!(%path, error = %e, "rejecting unauthenticated request");
            return Err(e.into());
        }
    };

    let claims = match state.verifier.authenticate(&token).await {
        Ok(claims) => claims,
        Err(e @ AuthError::KeySetFetch(_)) => return Err(e.into()),
        Err(e) => {
            warn!(%path, token = %token_prefix(&token), error = %e, "token verification failed");
            return Err(e.into());
        }
    };

    debug!(%path, user_id = %claims.sub, "request authenticated");
    req.extensions_mut().insert(Identity::from(claims));
    Ok(next.run(req).await)
}
