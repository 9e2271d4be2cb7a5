use std::error::Error as _;

use crate::{mode::SigningMode, signer::SigningError};

/// Everything that can end one execution early.
///
/// The executor never hands these to the stream consumer directly; each one is rendered into a
/// single terminal `error` progress event carrying the `Display` text.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// A required setting (resource server URL, developer key) is missing or unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// DNS, timeout or connection failure talking to the resource server or the gateway.
    #[error("Network error: {0}")]
    Network(String),

    /// The other side answered, but not with something the protocol allows.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The active signer refused or failed to sign.
    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    /// The consumer went away; no event is emitted for this.
    #[error("Execution cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for ExecutionError {
    fn from(err: reqwest::Error) -> Self {
        ExecutionError::Network(describe_transport_error(&err))
    }
}

impl From<x402_core::errors::Error> for ExecutionError {
    fn from(err: x402_core::errors::Error) -> Self {
        ExecutionError::Protocol(err.to_string())
    }
}

impl From<serde_json::Error> for ExecutionError {
    fn from(err: serde_json::Error) -> Self {
        ExecutionError::Protocol(err.to_string())
    }
}

/// Flatten a reqwest error and its sources into one readable line.
pub(crate) fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return match err.url() {
            Some(url) => format!("request to {url} timed out"),
            None => "request timed out".to_string(),
        };
    }

    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Reasons an execution cannot even start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Signing mode has not been resolved yet")]
    ModeNotResolved,

    #[error("An execution for service `{0}` is already in progress")]
    AlreadyExecuting(String),

    #[error("No execution path is available for {0} mode")]
    PathUnavailable(SigningMode),
}

/// Invalid values found while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("`{var}` is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("`{var}` must be a whole number of seconds, got `{value}`")]
    InvalidSeconds { var: &'static str, value: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
