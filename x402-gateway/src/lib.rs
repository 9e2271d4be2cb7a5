//! # X402 Gateway
//!
//! HTTP surface of the X402 executor. It keeps the developer key on the server and runs
//! developer-wallet executions here, streaming their progress back as NDJSON.
//!
//! | Route | |
//! |---|---|
//! | `GET /discover` | services offered by the resource server; always `200` |
//! | `GET /wallet-status` | whether a developer wallet is configured, and its address |
//! | `POST /execute` | `{serviceId, query}`; one `application/x-ndjson` progress event per line, even for a malformed body |
//! | `GET /health` | liveness |

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures_util::StreamExt;
use serde_json::json;
use x402_executor::{
    catalog::{Discovery, ServiceCatalog},
    config::ExecutorConfig,
    errors::ConfigError,
    executor::{ExecuteRequest, ExecutionPath, LocalExecution},
    progress::{ProgressEvent, ProgressStream, encode_frame},
    signer::DeveloperSigner,
    wallet::{DeveloperWallet, WalletStatus},
};

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("`{var}` is not a valid port: `{value}`")]
    InvalidPort { var: &'static str, value: String },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the gateway listens, from `HOST` (default `0.0.0.0`) and `PORT` (default `3000`).
pub fn bind_address_from_env() -> Result<SocketAddr, GatewayError> {
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = match std::env::var("PORT") {
        Ok(value) => value
            .trim()
            .parse::<u16>()
            .map_err(|_| GatewayError::InvalidPort { var: "PORT", value })?,
        Err(_) => 3000,
    };

    format!("{host}:{port}")
        .parse()
        .map_err(|_| GatewayError::InvalidPort {
            var: "HOST",
            value: host,
        })
}

pub struct AppState {
    pub catalog: ServiceCatalog,
    pub wallet: DeveloperWallet,
    /// Present only when the developer wallet is configured.
    pub developer_path: Option<LocalExecution<DeveloperSigner>>,
}

impl AppState {
    pub fn new(config: &ExecutorConfig, wallet: DeveloperWallet) -> Result<Self, ConfigError> {
        let catalog = ServiceCatalog::from_config(config)?;
        let developer_path = match wallet.signer() {
            Some(signer) => Some(LocalExecution::from_config(config, signer.clone())?),
            None => None,
        };

        Ok(AppState {
            catalog,
            wallet,
            developer_path,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/discover", get(discover))
        .route("/wallet-status", get(wallet_status))
        .route("/execute", post(execute))
        .route("/health", get(health))
        .with_state(state)
}

// GET /discover
async fn discover(State(state): State<Arc<AppState>>) -> Json<Discovery> {
    Json(state.catalog.discover().await)
}

// GET /wallet-status
async fn wallet_status(State(state): State<Arc<AppState>>) -> Json<WalletStatus> {
    Json(state.wallet.status())
}

// POST /execute
async fn execute(
    State(state): State<Arc<AppState>>,
    request: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Response {
    let events = match request {
        Ok(Json(request)) => run_developer_path(&state, request).await,
        Err(rejection) => {
            tracing::warn!("Rejected execute request: {rejection}");
            ProgressStream::once(ProgressEvent::error(format!(
                "Invalid execute request: {}",
                rejection.body_text()
            )))
        }
    };

    let body = Body::from_stream(events.map(|event| encode_frame(&event)));
    (
        [(CONTENT_TYPE, NDJSON_CONTENT_TYPE), (CACHE_CONTROL, "no-cache")],
        body,
    )
        .into_response()
}

async fn run_developer_path(state: &AppState, request: ExecuteRequest) -> ProgressStream {
    match &state.developer_path {
        None => ProgressStream::once(ProgressEvent::error(match &state.wallet {
            DeveloperWallet::Invalid(reason) => {
                format!("Developer wallet is misconfigured: {reason}")
            }
            _ => "Developer wallet is not configured".to_string(),
        })),
        Some(path) => match state.catalog.find(&request.service_id).await {
            Ok(service) => path.execute(&service, request.query),
            Err(err) => {
                tracing::warn!(service = %request.service_id, "Cannot execute: {err}");
                ProgressStream::once(ProgressEvent::error(err.to_string()))
            }
        },
    }
}

// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
