//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::auth::JwtVerifier;
use crate::config::Config;
use crate::entities::SqliteStore;
use crate::llm::{CompletionProvider, ModelInfo};

/// State shared across all HTTP handlers and spawned chat turns.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
    /// Verifies bearer tokens; owns the key-set cache.
    pub verifier: Arc<JwtVerifier>,
    pub provider: Arc<dyn CompletionProvider>,
    /// Models accepted as `modelId`; the first is the default.
    pub models: Arc<Vec<ModelInfo>>,
    /// System prompt assembled from the persona at startup.
    pub system_prompt: Arc<str>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("verifier", &self.verifier)
            .field("models", &self.models.len())
            .finish_non_exhaustive()
    }
}
