//! Executor settings, read from the environment or assembled with the builder.

use std::time::Duration;

use bon::Builder;
use url::Url;

use crate::{
    errors::{ConfigError, ExecutionError},
    signer::{ConnectedSigner, DEFAULT_CONFIRMATION_TIMEOUT, WalletConnector},
};

pub const RESOURCE_SERVER_URL_VAR: &str = "X402_RESOURCE_SERVER_URL";
pub const REQUEST_TIMEOUT_VAR: &str = "X402_REQUEST_TIMEOUT_SECS";
pub const SIGNING_TIMEOUT_VAR: &str = "X402_SIGNING_TIMEOUT_SECS";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the resource server lives, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceServer {
    Configured(Url),
    NotConfigured,
    /// A URL was given but does not parse.
    Invalid { raw: String, reason: String },
}

impl ResourceServer {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return ResourceServer::NotConfigured;
        };

        match Url::parse(raw) {
            Ok(url) => ResourceServer::Configured(url),
            Err(source) => ResourceServer::Invalid {
                raw: raw.to_string(),
                reason: ConfigError::InvalidUrl {
                    var: RESOURCE_SERVER_URL_VAR,
                    source,
                }
                .to_string(),
            },
        }
    }

    pub fn url(&self) -> Option<&Url> {
        match self {
            ResourceServer::Configured(url) => Some(url),
            _ => None,
        }
    }

    /// The URL as configured, or an empty string when there is none.
    pub fn display_url(&self) -> String {
        match self {
            ResourceServer::Configured(url) => url.to_string(),
            ResourceServer::NotConfigured => String::new(),
            ResourceServer::Invalid { raw, .. } => raw.clone(),
        }
    }

    /// The URL, or a configuration error explaining why there is none.
    pub fn require(&self) -> Result<&Url, ExecutionError> {
        match self {
            ResourceServer::Configured(url) => Ok(url),
            ResourceServer::NotConfigured => Err(ExecutionError::Configuration(format!(
                "Resource server URL is not configured; set {RESOURCE_SERVER_URL_VAR}"
            ))),
            ResourceServer::Invalid { reason, .. } => {
                Err(ExecutionError::Configuration(reason.clone()))
            }
        }
    }
}

/// ```
/// use std::time::Duration;
/// use x402_executor::config::{ExecutorConfig, ResourceServer};
///
/// let config = ExecutorConfig::builder()
///     .resource_server_url("http://localhost:4021")
///     .request_timeout(Duration::from_secs(10))
///     .build();
///
/// assert!(matches!(config.resource_server(), ResourceServer::Configured(_)));
/// assert_eq!(config.signing_timeout, Duration::from_secs(300));
/// ```
#[derive(Builder, Debug, Clone)]
pub struct ExecutorConfig {
    #[builder(into)]
    pub resource_server_url: Option<String>,
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,
    #[builder(default = DEFAULT_CONFIRMATION_TIMEOUT)]
    pub signing_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig::builder().build()
    }
}

impl ExecutorConfig {
    /// Read `X402_RESOURCE_SERVER_URL`, `X402_REQUEST_TIMEOUT_SECS` and
    /// `X402_SIGNING_TIMEOUT_SECS`. Unset values fall back to their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ExecutorConfig {
            resource_server_url: std::env::var(RESOURCE_SERVER_URL_VAR).ok(),
            request_timeout: seconds_from_env(REQUEST_TIMEOUT_VAR, DEFAULT_REQUEST_TIMEOUT)?,
            signing_timeout: seconds_from_env(SIGNING_TIMEOUT_VAR, DEFAULT_CONFIRMATION_TIMEOUT)?,
        })
    }

    pub fn resource_server(&self) -> ResourceServer {
        ResourceServer::parse(self.resource_server_url.as_deref())
    }

    /// Wrap the user's wallet, bounding confirmation waits by `signing_timeout`.
    pub fn connected_signer<C: WalletConnector>(&self, connector: C) -> ConnectedSigner<C> {
        ConnectedSigner::new(connector).with_confirmation_timeout(self.signing_timeout)
    }

    /// The shared HTTP client. Per-request timeouts are applied by each caller, since the
    /// `/execute` stream may legitimately outlive one.
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        Ok(reqwest::Client::builder()
            .connect_timeout(self.request_timeout)
            .build()?)
    }
}

fn seconds_from_env(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(var) {
        Ok(value) => parse_seconds(var, &value),
        Err(_) => Ok(default),
    }
}

fn parse_seconds(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidSeconds {
            var,
            value: value.to_string(),
        })
}

/// Join `path` onto `base`, keeping any path prefix `base` already has.
pub(crate) fn endpoint(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
