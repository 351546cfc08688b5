//! Text-completion client.
//!
//! [`CompletionClient`] is the seam the relay depends on; [`OpenAiClient`]
//! implements it against an OpenAI-compatible `chat/completions` endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

use crate::error::{excerpt, Service, UpstreamError};
use crate::prompt::PromptSpec;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// The model's reply for a single prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub text: String,
}

#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// Model identifier requests are sent to.
    fn model(&self) -> &str;

    async fn complete(&self, spec: &PromptSpec) -> Result<CompletionResult, UpstreamError>;
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

pub struct OpenAiClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to create completion http client")?;
        Ok(Self {
            http,
            url: chat_completions_url(&config.api_base),
            api_key: config.api_key.trim().to_string(),
            model: config.model.clone(),
        })
    }

    fn request_body(&self, spec: &PromptSpec) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": spec.system_instruction},
                {"role": "user", "content": spec.user_payload},
            ],
        })
    }
}

fn chat_completions_url(api_base: &str) -> String {
    let base = api_base.trim().trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        return base.to_string();
    }
    format!("{base}/chat/completions")
}

fn transport(source: reqwest::Error) -> UpstreamError {
    UpstreamError::Transport {
        service: Service::Completion,
        source,
    }
}

/// Pull the first choice's content out of a raw response body.
fn extract_reply(body: &str) -> Result<CompletionResult, UpstreamError> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| UpstreamError::Decode {
            service: Service::Completion,
            detail: e.to_string(),
        })?;
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(UpstreamError::Empty {
            service: Service::Completion,
        })?;
    Ok(CompletionResult { text })
}

#[async_trait::async_trait]
impl CompletionClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, spec: &PromptSpec) -> Result<CompletionResult, UpstreamError> {
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(spec))
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(UpstreamError::Status {
                service: Service::Completion,
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }
        tracing::trace!(model = %self.model, bytes = body.len(), "completion response received");
        extract_reply(&body)
    }
}
