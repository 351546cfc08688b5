//! Prompt templates for the two firewall log categories.
//!
//! The instruction text depends only on the [`EndpointKind`]; the log event
//! itself is forwarded untouched as the user message.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Log category handled by a route. Chosen by the route, never by payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Decryption,
    GlobalProtect,
}

impl EndpointKind {
    pub const ALL: [EndpointKind; 2] = [EndpointKind::Decryption, EndpointKind::GlobalProtect];

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Decryption => "decryption",
            EndpointKind::GlobalProtect => "globalprotect",
        }
    }

    /// Route path serving this kind.
    pub fn path(&self) -> &'static str {
        match self {
            EndpointKind::Decryption => "/pangpt/decryption/",
            EndpointKind::GlobalProtect => "/pangpt/globalprotect/",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single firewall log record: field name to string value, kept in the
/// order the firewall sent them. Any nested or non-string value fails
/// deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(transparent)]
pub struct LogEvent(#[schema(value_type = std::collections::HashMap<String, String>)] Map<String, Value>);

impl LogEvent {
    pub fn field_count(&self) -> usize {
        self.0.len()
    }

    /// Compact JSON object in the original field order.
    pub fn render(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

impl<'de> Deserialize<'de> for LogEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        if let Some((key, _)) = fields.iter().find(|(_, value)| !value.is_string()) {
            return Err(D::Error::custom(format!("field `{key}` must be a string")));
        }
        Ok(LogEvent(fields))
    }
}

impl<K, V> FromIterator<(K, V)> for LogEvent
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        LogEvent(
            iter.into_iter()
                .map(|(k, v)| (k.into(), Value::String(v.into())))
                .collect(),
        )
    }
}

/// Instruction/payload pair handed to the completion client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    pub system_instruction: String,
    pub user_payload: String,
}

const DECRYPTION_INSTRUCTION: &str = "\
I want you to role play as a bot that specializes within the network and cybersecurity industry, specifically with Palo Alto Networks PAN-OS firewalls.
You will be fed a JSON formatted log message from the firewall and will be tasked with troubleshooting the decryption log below.
Your response will be use the Jinja2 template below, but will also include a short sentence recommendation on next steps.
Do not include an explanation, just return the result of the Jinja2 template and the recommendation.

- name: {{ name }}
  sni: {{ sni }}
  commonname: {{ commonname }}
  root: {{ root }}
  rootstatus: {{ rootstatus }}
  details: {{ details }}
  sourceip: {{ sourceip }}
  sourceuser: {{ sourceuser }}
  destinationip: {{ destinationip }}
  application: {{ application }}";

const GLOBALPROTECT_INSTRUCTION: &str = "\
I want you to role play as a bot that specializes within the network and cybersecurity industry, specifically with Palo Alto Networks PAN-OS firewalls.
You will be fed a JSON formatted log message from the firewall and will be tasked with troubleshooting the Global Protect log below.
Your response will be detailed troubleshooting information. Include affected users, affected devices, and any other information that would be helpful to the user.
Your response will not reference yourself, will be without pronouns, and will be written in the third person as a Slack message.
The response needs to be structured in Slack Block format as it will be sent to the user as a Slack message.";

/// Instruction template for `kind`, without the trailing period.
pub fn instruction_template(kind: EndpointKind) -> &'static str {
    match kind {
        EndpointKind::Decryption => DECRYPTION_INSTRUCTION,
        EndpointKind::GlobalProtect => GLOBALPROTECT_INSTRUCTION,
    }
}

pub fn build(kind: EndpointKind, event: &LogEvent) -> PromptSpec {
    PromptSpec {
        system_instruction: format!("{}.", instruction_template(kind)),
        user_payload: event.render(),
    }
}
