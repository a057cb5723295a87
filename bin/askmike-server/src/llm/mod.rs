//! Hosted completion API.
//!
//! [`CompletionProvider`] is the seam between the chat orchestrator and the
//! LLM service. The production implementation is
//! [`openai::OpenAiProvider`]; tests substitute a scripted provider.

pub mod openai;
pub mod persona;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

pub use openai::OpenAiProvider;
pub use persona::Persona;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
}

/// One message of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptMessage {
    pub role: String,
    /// A string, or an array of content parts.
    pub content: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Provider-side model identifier, e.g. `"gpt-4o-mini"`.
    pub model: String,
    pub system: String,
    pub messages: Vec<PromptMessage>,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Stream a completion, calling `on_delta` for every text chunk.
    ///
    /// Returns the full assistant text once the stream ends.
    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        on_delta: &(dyn Fn(String) + Send + Sync),
    ) -> Result<String, LlmError>;
}

// ── Model catalog ─────────────────────────────────────────────────────────────

/// A model the chat endpoint accepts as `modelId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    pub label: String,
    pub api_identifier: String,
    pub description: String,
}

/// Available models; the first entry is the default.
pub fn model_catalog() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: "gpt-4o-mini".into(),
            label: "GPT 4o mini".into(),
            api_identifier: "gpt-4o-mini".into(),
            description: "Small model for fast, lightweight tasks".into(),
        },
        ModelInfo {
            id: "gpt-4o".into(),
            label: "GPT 4o".into(),
            api_identifier: "gpt-4o".into(),
            description: "For complex, multi-step tasks".into(),
        },
    ]
}

/// The catalog entry for `model_id`, or the default model when unknown.
pub fn resolve_model<'a>(catalog: &'a [ModelInfo], model_id: Option<&str>) -> Option<&'a ModelInfo> {
    model_id
        .and_then(|id| catalog.iter().find(|m| m.id == id))
        .or_else(|| catalog.first())
}
