use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated while polling an option chain.
///
/// Upstream failures collapse into three recoverable kinds. Messages are kept as `String`s so
/// the error can be cloned into caller-owned state and shown next to a stale snapshot.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("upstream rejected request with HTTP {status}: {reason}")]
    UpstreamRejected { status: u16, reason: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid endpoint url: {0}")]
    InvalidEndpoint(String),
}

impl FetchError {
    /// Determine if retrying the same request may succeed.
    ///
    /// Everything the upstream can do to us is recoverable. A broken endpoint configuration
    /// fails identically on every attempt.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FetchError::InvalidEndpoint(_))
    }

    /// Determine if the upstream is throttling or bot-blocking this client.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            FetchError::UpstreamRejected {
                status: 401 | 403 | 429,
                ..
            }
        )
    }

    /// Short label used by status lines.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::UpstreamRejected { .. } => "rejected",
            FetchError::MalformedResponse(_) => "malformed",
            FetchError::InvalidEndpoint(_) => "config",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            FetchError::UpstreamRejected {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            }
        } else if error.is_decode() {
            FetchError::MalformedResponse(error.to_string())
        } else {
            FetchError::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(error: serde_json::Error) -> Self {
        FetchError::MalformedResponse(error.to_string())
    }
}

impl From<url::ParseError> for FetchError {
    fn from(error: url::ParseError) -> Self {
        FetchError::InvalidEndpoint(error.to_string())
    }
}
