//! OpenAI-compatible `/chat/completions` streaming client.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CompletionProvider, CompletionRequest, LlmError, PromptMessage};
use crate::config::Config;

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<PromptMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAiStreamResponse {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}

/// What one SSE line of the completion stream carries.
#[derive(Debug, PartialEq, Eq)]
enum StreamLine {
    Delta { content: Option<String>, finished: bool },
    Done,
    Ignored,
}

fn parse_stream_line(line: &str) -> StreamLine {
    let Some(data) = line.trim().strip_prefix("data:").map(str::trim) else {
        return StreamLine::Ignored;
    };
    if data == "[DONE]" {
        return StreamLine::Done;
    }
    match serde_json::from_str::<OpenAiStreamResponse>(data) {
        Ok(parsed) => match parsed.choices.into_iter().next() {
            Some(choice) => StreamLine::Delta {
                content: choice.delta.content.filter(|c| !c.is_empty()),
                finished: choice.finish_reason.is_some(),
            },
            None => StreamLine::Ignored,
        },
        Err(e) => {
            warn!(error = %e, "skipping unparseable completion chunk");
            StreamLine::Ignored
        }
    }
}

impl OpenAiProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    pub fn from_config(cfg: &Config, client: reqwest::Client) -> Self {
        Self::new(client, cfg.openai_api_key.clone(), cfg.openai_base_url.clone())
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        on_delta: &(dyn Fn(String) + Send + Sync),
    ) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(PromptMessage {
            role: "system".into(),
            content: serde_json::Value::String(request.system.clone()),
        });
        messages.extend(request.messages.iter().cloned());

        let body = OpenAiRequest {
            model: &request.model,
            messages,
            stream: true,
        };

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        debug!(model = %request.model, messages = request.messages.len(), "starting completion stream");
        let resp = req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        let mut full_content = String::new();
        let mut stream = resp.bytes_stream();
        // Bytes, not text: a chunk may end inside a multi-byte character.
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);

            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw);
                match parse_stream_line(&line) {
                    StreamLine::Done => return Ok(full_content),
                    StreamLine::Delta { content, finished } => {
                        if let Some(content) = content {
                            full_content.push_str(&content);
                            on_delta(content);
                        }
                        if finished {
                            return Ok(full_content);
                        }
                    }
                    StreamLine::Ignored => {}
                }
            }
        }

        if full_content.is_empty() {
            return Err(LlmError::Parse("completion stream ended without content".into()));
        }
        Ok(full_content)
    }
}
