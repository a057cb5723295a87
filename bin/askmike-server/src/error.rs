//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! Internal errors (Upstream, Database, Internal) are logged with full detail
//! but only a generic message is returned to the caller so that key-set
//! URLs, SQL, or provider responses never leak to clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::AuthError;
use crate::llm::LlmError;

/// All errors that can occur in the askmike-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Missing or invalid credentials, or the caller does not own the resource.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request collides with an existing row (e.g. a unique email).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request body exceeds a configured limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// A dependency outside the process (key set, completion API) failed.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Propagated from the SQLite store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ServerError::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),

            // Internal errors: log the full detail, return a generic message.
            ServerError::Upstream(m) => {
                error!(message = %m, "upstream dependency failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "upstream service error".to_owned(),
                )
            }
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<AuthError> for ServerError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::KeySetFetch(m) => ServerError::Upstream(format!("key set: {m}")),
            other => ServerError::Unauthorized(other.to_string()),
        }
    }
}

impl From<LlmError> for ServerError {
    fn from(e: LlmError) -> Self {
        ServerError::Upstream(format!("completion: {e}"))
    }
}

impl From<validator::ValidationErrors> for ServerError {
    fn from(e: validator::ValidationErrors) -> Self {
        ServerError::BadRequest(e.to_string())
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        // Log the full chain before discarding it; clients only see a
        // generic message.
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

/// Translate a unique-constraint violation into [`ServerError::Conflict`].
pub fn map_unique_violation(e: sqlx::Error, what: &str) -> ServerError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ServerError::Conflict(format!("{what} already in use"))
        }
        _ => ServerError::Database(e),
    }
}
