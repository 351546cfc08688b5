//! Per-request relay pipeline: build prompt, complete, format, publish.
//!
//! Every stage runs at most once and in order. A failure short-circuits the
//! remaining stages, so a failed completion never reaches the publisher.

use std::sync::Arc;
use std::time::Instant;

use crate::completion::CompletionClient;
use crate::error::RelayError;
use crate::prompt::{self, EndpointKind, LogEvent};
use crate::slack::{self, ChatPublisher};

#[derive(Clone)]
pub struct Relay {
    completion: Arc<dyn CompletionClient>,
    publisher: Arc<dyn ChatPublisher>,
    channel: String,
}

impl Relay {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        publisher: Arc<dyn ChatPublisher>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            completion,
            publisher,
            channel: channel.into(),
        }
    }

    pub fn model(&self) -> &str {
        self.completion.model()
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn handle(&self, kind: EndpointKind, event: &LogEvent) -> Result<(), RelayError> {
        let start = Instant::now();
        let spec = prompt::build(kind, event);
        tracing::debug!(%kind, fields = event.field_count(), "prompt built");

        let reply = self
            .completion
            .complete(&spec)
            .await
            .map_err(RelayError::Completion)?;
        tracing::debug!(
            %kind,
            reply_bytes = reply.text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "completion received"
        );

        let message = slack::format_reply(kind, &reply);
        self.publisher
            .publish(
                &self.channel,
                &message.blocks,
                message.fallback_text.as_deref(),
            )
            .await
            .map_err(RelayError::Publish)?;

        tracing::info!(
            %kind,
            model = %self.model(),
            latency_ms = start.elapsed().as_millis() as u64,
            "log event relayed"
        );
        Ok(())
    }
}
