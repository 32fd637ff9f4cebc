//! Error channels for API requests.

use std::error::Error as _;

use reqwest::StatusCode;
use thiserror::Error;

/// Shown when a request exceeds its timeout.
pub const TIMEOUT_MESSAGE: &str = "Request timed out! Please try again later.";

/// Shown when the server cannot be reached.
pub const NETWORK_MESSAGE: &str = "Network error! Please try again later.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}", TIMEOUT_MESSAGE)]
    Timeout(#[source] reqwest::Error),

    #[error("{}", NETWORK_MESSAGE)]
    Network(#[source] reqwest::Error),

    #[error("Session expired: {msg}")]
    SessionExpired { msg: String },

    #[error("Request failed with code {code}: {msg}")]
    Business { code: i64, msg: String },

    #[error("HTTP {status}: {message}")]
    Status {
        status: StatusCode,
        message: &'static str,
    },

    #[error("Request cancelled by a newer duplicate")]
    Cancelled,

    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Failed to serialize request parameters: {0}")]
    Params(#[from] serde_json::Error),

    #[error("Invalid query parameters: {0}")]
    Query(String),

    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// Transport failure kinds that get a dedicated user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    Timeout,
    Network,
}

impl TransportFailure {
    /// Classify a transport error message by substring.
    pub fn from_message(message: &str) -> Option<Self> {
        let lower = message.to_ascii_lowercase();
        if lower.contains("timeout") || lower.contains("timed out") {
            Some(Self::Timeout)
        } else if lower.contains("network error")
            || lower.contains("connection refused")
            || lower.contains("dns error")
            || lower.contains("error sending request")
        {
            Some(Self::Network)
        } else {
            None
        }
    }

    /// Classify a `reqwest` error by its predicates, then its message chain.
    pub fn classify(err: &reqwest::Error) -> Option<Self> {
        if err.is_timeout() {
            return Some(Self::Timeout);
        }
        if err.is_connect() {
            return Some(Self::Network);
        }
        Self::from_message(&error_chain(err))
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Timeout => TIMEOUT_MESSAGE,
            Self::Network => NETWORK_MESSAGE,
        }
    }
}

impl ApiError {
    /// Wrap a transport error into the matching channel.
    pub fn from_transport(err: reqwest::Error) -> Self {
        match TransportFailure::classify(&err) {
            Some(TransportFailure::Timeout) => Self::Timeout(err),
            Some(TransportFailure::Network) => Self::Network(err),
            None => Self::Transport(err),
        }
    }
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
