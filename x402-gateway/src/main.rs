use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use x402_executor::{config::ExecutorConfig, wallet::DeveloperWallet};
use x402_gateway::{AppState, GatewayError, bind_address_from_env, router};

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ExecutorConfig::from_env()?;
    let wallet = DeveloperWallet::from_env();
    match wallet.address() {
        Some(address) => tracing::info!(%address, "Developer wallet configured"),
        None => tracing::info!("Developer wallet not configured; only connected wallets can pay"),
    }
    match config.resource_server().url() {
        Some(url) => tracing::info!(%url, "Using resource server"),
        None => tracing::warn!("Resource server URL is not configured"),
    }

    let state = Arc::new(AppState::new(&config, wallet)?);
    let app = router(state).layer(TraceLayer::new_for_http());

    let addr = bind_address_from_env()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("X402 gateway listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
