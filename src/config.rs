use std::env;

use anyhow::{anyhow, Result};

use crate::completion::{self, OpenAiConfig};
use crate::slack::{self, SlackConfig};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub completion: OpenAiConfig,
    pub slack: SlackConfig,
    pub max_request_bytes: Option<usize>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let completion = OpenAiConfig {
            api_base: optional_string("OPENAI_API_BASE")?
                .unwrap_or_else(|| completion::DEFAULT_API_BASE.to_string()),
            api_key: required_string("OPENAI_TOKEN")?,
            model: optional_string("PANGPT_MODEL")?
                .unwrap_or_else(|| completion::DEFAULT_MODEL.to_string()),
            timeout_ms: parse_positive_u64("PANGPT_COMPLETION_TIMEOUT_MS")?
                .unwrap_or(completion::DEFAULT_TIMEOUT_MS),
        };

        // Posting only needs the bot token; the app token is checked for presence.
        if optional_string("SLACKBOT_PANGPT_APP_TOKEN")?.is_none() {
            tracing::warn!("SLACKBOT_PANGPT_APP_TOKEN not set; continuing with bot token only");
        }
        let slack = SlackConfig {
            api_base: optional_string("SLACK_API_BASE")?
                .unwrap_or_else(|| slack::DEFAULT_API_BASE.to_string()),
            bot_token: required_string("SLACKBOT_PANGPT_BOT_TOKEN")?,
            channel: required_string("SLACK_CHANNEL")?,
            timeout_ms: parse_positive_u64("PANGPT_CHAT_TIMEOUT_MS")?
                .unwrap_or(slack::DEFAULT_TIMEOUT_MS),
        };

        let max_request_bytes =
            parse_positive_u64("PANGPT_MAX_REQUEST_BYTES")?.map(|v| v as usize);

        Ok(Self {
            completion,
            slack,
            max_request_bytes,
        })
    }
}

fn optional_string(var: &str) -> Result<Option<String>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(Some(value.trim().to_string())),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(anyhow!("{} is not valid unicode: {}", var, err)),
    }
}

fn required_string(var: &str) -> Result<String> {
    optional_string(var)?.ok_or_else(|| anyhow!("{} must be set", var))
}

fn parse_positive_u64(var: &str) -> Result<Option<u64>> {
    match optional_string(var)? {
        Some(value) => match value.parse::<u64>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(anyhow!("{} must be a positive integer", var)),
        },
        None => Ok(None),
    }
}
