use std::time::Duration;

use http::header::CACHE_CONTROL;
use serde::{Deserialize, Serialize};
use url::Url;
use x402_core::types::AnyJson;

use crate::{
    config::{DEFAULT_REQUEST_TIMEOUT, ExecutorConfig, ResourceServer, endpoint},
    errors::{ConfigError, ExecutionError, describe_transport_error},
    service::Service,
};

/// Path of the service listing on a resource server.
pub const SERVICES_PATH: &str = "api/x402/services";

/// Result of one catalog lookup. Failures are reported in `error`, never raised.
///
/// `server_url` is empty when no resource server is configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discovery {
    pub services: Vec<Service>,
    #[serde(default)]
    pub server_url: String,
    pub configured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceListing {
    #[serde(default)]
    services: Option<Vec<AnyJson>>,
}

/// Read-only view of the services a resource server offers.
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    client: reqwest::Client,
    resource_server: ResourceServer,
    request_timeout: Duration,
}

impl ServiceCatalog {
    pub fn new(client: reqwest::Client, resource_server: ResourceServer) -> Self {
        ServiceCatalog {
            client,
            resource_server,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.http_client()?, config.resource_server())
            .with_request_timeout(config.request_timeout))
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn resource_server(&self) -> &ResourceServer {
        &self.resource_server
    }

    /// Fetch the current service list.
    pub async fn discover(&self) -> Discovery {
        let url = match self.resource_server.require() {
            Ok(url) => url,
            Err(err) => {
                return Discovery {
                    server_url: self.resource_server.display_url(),
                    error: Some(err.to_string()),
                    ..Default::default()
                };
            }
        };

        let (services, error) = match self.fetch(url).await {
            Ok(services) => (services, None),
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%url, "Service discovery failed: {err}");
                (Vec::new(), Some(err.to_string()))
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(%url, count = services.len(), "Discovered services");

        Discovery {
            services,
            server_url: url.to_string(),
            configured: true,
            error,
        }
    }

    /// Look up one service by id.
    pub async fn find(&self, service_id: &str) -> Result<Service, ExecutionError> {
        self.resource_server.require()?;
        let discovery = self.discover().await;
        if let Some(error) = discovery.error {
            return Err(ExecutionError::Network(error));
        }

        discovery
            .services
            .into_iter()
            .find(|service| service.id == service_id)
            .ok_or_else(|| {
                ExecutionError::Configuration(format!("Service `{service_id}` was not found"))
            })
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<Service>, CatalogError> {
        let response = self
            .client
            .get(endpoint(url, SERVICES_PATH))
            .header(CACHE_CONTROL, "no-cache")
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|err| CatalogError::Transport(describe_transport_error(&err)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status));
        }

        let listing: ServiceListing = response
            .json()
            .await
            .map_err(|err| CatalogError::Body(describe_transport_error(&err)))?;

        let services = listing
            .services
            .unwrap_or_default()
            .into_iter()
            .map(|entry| {
                Service::from_entry(entry).unwrap_or_else(|_err| {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Unreadable service entry kept with empty fields: {_err}");
                    Service::default()
                })
            })
            .collect();
        Ok(services)
    }
}

#[derive(Debug, thiserror::Error)]
enum CatalogError {
    #[error("Failed to reach resource server: {0}")]
    Transport(String),
    #[error("Resource server responded with {0}")]
    Status(reqwest::StatusCode),
    #[error("Invalid service listing: {0}")]
    Body(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_catalog_reports_without_fetching() {
        let catalog = ServiceCatalog::new(reqwest::Client::new(), ResourceServer::NotConfigured);

        let discovery = catalog.discover().await;

        assert!(!discovery.configured);
        assert!(discovery.services.is_empty());
        assert_eq!(discovery.server_url, "");
        assert!(discovery.error.unwrap().contains("X402_RESOURCE_SERVER_URL"));
    }

    #[tokio::test]
    async fn invalid_url_is_reported_as_unconfigured() {
        let catalog = ServiceCatalog::new(
            reqwest::Client::new(),
            ResourceServer::parse(Some("::not a url::")),
        );

        let discovery = catalog.discover().await;
        assert!(!discovery.configured);
        assert!(discovery.error.is_some());
        assert_eq!(discovery.server_url, "::not a url::");
    }

    #[tokio::test]
    async fn find_on_unconfigured_catalog_is_a_configuration_error() {
        let catalog = ServiceCatalog::new(reqwest::Client::new(), ResourceServer::NotConfigured);
        assert!(matches!(
            catalog.find("svc-1").await,
            Err(ExecutionError::Configuration(_))
        ));
    }

    #[test]
    fn discovery_wire_shape() {
        let discovery = Discovery {
            configured: false,
            error: Some("not configured".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&discovery).unwrap(),
            serde_json::json!({
                "services": [],
                "serverUrl": "",
                "configured": false,
                "error": "not configured",
            })
        );
    }
}
