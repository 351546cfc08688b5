//! Chat publishing: Block Kit message types, per-kind formatting and the
//! Slack `chat.postMessage` publisher.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::completion::CompletionResult;
use crate::error::{excerpt, Service, UpstreamError};
use crate::prompt::EndpointKind;

pub const DEFAULT_API_BASE: &str = "https://slack.com/api";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Fallback text for clients that cannot render blocks (decryption only).
pub const DECRYPTION_FALLBACK_TEXT: &str = "Here's the message content:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockText {
    #[serde(rename = "type")]
    pub format: &'static str,
    pub text: String,
}

/// A `section` block with a single mrkdwn text element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: BlockText,
}

impl ChatBlock {
    pub fn section(body: impl Into<String>) -> Self {
        Self {
            kind: "section",
            text: BlockText {
                format: "mrkdwn",
                text: body.into(),
            },
        }
    }

    pub fn body(&self) -> &str {
        &self.text.text
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub blocks: Vec<ChatBlock>,
    pub fallback_text: Option<String>,
}

/// Turn a model reply into the message published for `kind`.
///
/// Decryption replies follow a fixed field template, so they are fenced to
/// keep their alignment. GlobalProtect replies are already Slack-formatted.
pub fn format_reply(kind: EndpointKind, reply: &CompletionResult) -> ChatMessage {
    match kind {
        EndpointKind::Decryption => ChatMessage {
            blocks: vec![ChatBlock::section(format!("```\n{}\n```", reply.text))],
            fallback_text: Some(DECRYPTION_FALLBACK_TEXT.to_string()),
        },
        EndpointKind::GlobalProtect => ChatMessage {
            blocks: vec![ChatBlock::section(reply.text.clone())],
            fallback_text: None,
        },
    }
}

#[async_trait::async_trait]
pub trait ChatPublisher: Send + Sync {
    async fn publish(
        &self,
        channel: &str,
        blocks: &[ChatBlock],
        fallback_text: Option<&str>,
    ) -> Result<(), UpstreamError>;
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub api_base: String,
    pub bot_token: String,
    pub channel: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct SlackPostResponse {
    ok: bool,
    error: Option<String>,
}

pub struct SlackPublisher {
    http: reqwest::Client,
    url: String,
    bot_token: String,
}

impl SlackPublisher {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to create slack http client")?;
        Ok(Self {
            http,
            url: format!("{}/chat.postMessage", config.api_base.trim().trim_end_matches('/')),
            bot_token: config.bot_token.trim().to_string(),
        })
    }
}

fn post_message_payload(
    channel: &str,
    blocks: &[ChatBlock],
    fallback_text: Option<&str>,
) -> serde_json::Value {
    let mut payload = json!({
        "channel": channel,
        "blocks": blocks,
    });
    if let Some(text) = fallback_text {
        payload["text"] = serde_json::Value::String(text.to_string());
    }
    payload
}

fn transport(source: reqwest::Error) -> UpstreamError {
    UpstreamError::Transport {
        service: Service::Chat,
        source,
    }
}

#[async_trait::async_trait]
impl ChatPublisher for SlackPublisher {
    async fn publish(
        &self,
        channel: &str,
        blocks: &[ChatBlock],
        fallback_text: Option<&str>,
    ) -> Result<(), UpstreamError> {
        let payload = post_message_payload(channel, blocks, fallback_text);
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.bot_token)
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(UpstreamError::Status {
                service: Service::Chat,
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }
        let parsed: SlackPostResponse =
            serde_json::from_str(&body).map_err(|e| UpstreamError::Decode {
                service: Service::Chat,
                detail: e.to_string(),
            })?;
        if !parsed.ok {
            return Err(UpstreamError::Rejected {
                service: Service::Chat,
                code: parsed.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(())
    }
}
