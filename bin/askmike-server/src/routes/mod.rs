//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - Middleware layers (panic catcher, CORS, per-request trace-ID injection)
//! - Optional OpenAPI document (disable with `ASKMIKE_ENABLE_DOCS=false`)
//! - Health / heartbeat route
//! - Authenticated `/api` routes
//! - Uploaded files under `/uploads`

pub mod api;
pub mod doc;
pub mod extract;
mod health;
#[cfg(test)]
mod tests;

use std::any::Any;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router, middleware};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tracing::error;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .nest("/api", api::router(state.clone()))
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir));

    if state.config.enable_docs {
        app = app.route("/api-docs/openapi.json", get(doc::openapi_json));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(cors::cors_layer(state.clone())),
        )
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal server error" })),
    )
        .into_response()
}
