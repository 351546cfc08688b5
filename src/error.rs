//! Error types shared by the outbound clients and the relay pipeline.

use std::fmt;

use thiserror::Error;

/// Which external collaborator produced an [`UpstreamError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Completion,
    Chat,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Completion => f.write_str("completion"),
            Service::Chat => f.write_str("chat"),
        }
    }
}

/// Failure of a single outbound call. Every call is attempted exactly once,
/// so any of these is terminal for the request that triggered it.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} request failed: {source}")]
    Transport {
        service: Service,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: Service,
        status: u16,
        body: String,
    },

    #[error("{service} response could not be decoded: {detail}")]
    Decode { service: Service, detail: String },

    #[error("{service} response contained no usable content")]
    Empty { service: Service },

    #[error("{service} rejected the request: {code}")]
    Rejected { service: Service, code: String },
}

impl UpstreamError {
    pub fn service(&self) -> Service {
        match self {
            UpstreamError::Transport { service, .. }
            | UpstreamError::Status { service, .. }
            | UpstreamError::Decode { service, .. }
            | UpstreamError::Empty { service }
            | UpstreamError::Rejected { service, .. } => *service,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, UpstreamError::Transport { source, .. } if source.is_timeout())
    }
}

/// Pipeline stage a relay failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Completion,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Completion => "completion",
            Stage::Publish => "publish",
        }
    }
}

/// Error returned by [`crate::relay::Relay::handle`]. Both variants collapse
/// to the same generic 500 at the HTTP boundary.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("completion stage failed: {0}")]
    Completion(#[source] UpstreamError),

    #[error("publish stage failed: {0}")]
    Publish(#[source] UpstreamError),
}

impl RelayError {
    pub fn stage(&self) -> Stage {
        match self {
            RelayError::Completion(_) => Stage::Completion,
            RelayError::Publish(_) => Stage::Publish,
        }
    }

    pub fn upstream(&self) -> &UpstreamError {
        match self {
            RelayError::Completion(err) | RelayError::Publish(err) => err,
        }
    }
}

/// Truncate an upstream body for inclusion in an error message.
pub(crate) fn excerpt(body: &str) -> String {
    const MAX: usize = 256;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
