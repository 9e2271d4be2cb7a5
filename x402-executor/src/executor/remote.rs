use std::time::Duration;

use futures_util::StreamExt;
use url::Url;
use x402_core::types::AnyJson;

use crate::{
    catalog::Discovery,
    config::{DEFAULT_REQUEST_TIMEOUT, endpoint},
    errors::ExecutionError,
    executor::{ExecuteRequest, ExecutionPath},
    mode::SigningMode,
    progress::{NdjsonDecoder, ProgressEvent, ProgressSink, ProgressStream, progress_channel},
    service::Service,
    wallet::{WalletStatus, WalletStatusSource},
};

pub const DISCOVER_PATH: &str = "discover";
pub const WALLET_STATUS_PATH: &str = "wallet-status";
pub const EXECUTE_PATH: &str = "execute";

/// HTTP client for the gateway's JSON endpoints.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: Url,
    request_timeout: Duration,
}

impl GatewayClient {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        GatewayClient {
            client,
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /discover`.
    pub async fn discover(&self) -> Result<Discovery, ExecutionError> {
        self.get_json(DISCOVER_PATH).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ExecutionError> {
        let response = self
            .client
            .get(endpoint(&self.base_url, path))
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionError::Network(format!(
                "Gateway responded to /{path} with {status}"
            )));
        }
        Ok(response.json().await?)
    }
}

impl WalletStatusSource for GatewayClient {
    /// `GET /wallet-status`.
    async fn wallet_status(&self) -> Result<WalletStatus, ExecutionError> {
        self.get_json(WALLET_STATUS_PATH).await
    }
}

/// The developer-wallet path as seen from the caller: the gateway runs the protocol and
/// streams the events back as NDJSON over `POST /execute`.
#[derive(Debug, Clone)]
pub struct RemoteExecution {
    gateway: GatewayClient,
}

impl RemoteExecution {
    pub fn new(gateway: GatewayClient) -> Self {
        RemoteExecution { gateway }
    }

    async fn relay(
        gateway: GatewayClient,
        request: ExecuteRequest,
        sink: &ProgressSink,
    ) -> Result<(), ExecutionError> {
        // No overall timeout: the stream lives as long as the execution does.
        let response = tokio::select! {
            biased;
            _ = sink.cancelled() => return Err(ExecutionError::Cancelled),
            response = gateway
                .client
                .post(endpoint(&gateway.base_url, EXECUTE_PATH))
                .json(&request)
                .send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionError::Network(format!(
                "Gateway responded to /{EXECUTE_PATH} with {status}"
            )));
        }

        let mut body = response.bytes_stream();
        let mut decoder = NdjsonDecoder::new();
        loop {
            let chunk = tokio::select! {
                biased;
                _ = sink.cancelled() => return Err(ExecutionError::Cancelled),
                chunk = body.next() => chunk,
            };
            let Some(chunk) = chunk else { break };

            for event in decoder.decode(&chunk?)? {
                if forward(sink, event).await? {
                    return Ok(());
                }
            }
        }

        if let Some(event) = decoder.finish()? {
            if forward(sink, event).await? {
                return Ok(());
            }
        }
        Err(ExecutionError::Protocol(
            "Execution stream ended before completion".to_string(),
        ))
    }
}

/// Pass one event on; `true` once the execution is over.
async fn forward(sink: &ProgressSink, event: ProgressEvent) -> Result<bool, ExecutionError> {
    let terminal = event.is_terminal();
    sink.emit(event).await?;
    Ok(terminal)
}

impl ExecutionPath for RemoteExecution {
    fn mode(&self) -> SigningMode {
        SigningMode::DeveloperWallet
    }

    fn execute(&self, service: &Service, query: AnyJson) -> ProgressStream {
        let gateway = self.gateway.clone();
        let request = ExecuteRequest {
            service_id: service.id.clone(),
            query,
        };
        let (sink, stream) = progress_channel();

        #[cfg(feature = "tracing")]
        let span = tracing::info_span!("remote_execution", service = %request.service_id);

        let task = async move {
            match Self::relay(gateway, request, &sink).await {
                Ok(()) | Err(ExecutionError::Cancelled) => {}
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Remote execution failed: {err}");
                    let _ = sink.emit(ProgressEvent::error(err.to_string())).await;
                }
            }
        };

        #[cfg(feature = "tracing")]
        let task = tracing::Instrument::instrument(task, span);

        tokio::spawn(task);
        stream
    }
}
