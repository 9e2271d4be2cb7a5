//! # X402 Executor
//!
//! Client-side engine for X402 payment-gated services: discover what a resource server offers,
//! request a resource, answer its `402 Payment Required` with a signed EIP-3009 authorization
//! sent through a settlement router, and report each step as it happens.
//!
//! ## Related Crates
//!
//! - **`x402-core`**: the wire types this crate speaks.
//! - **`x402-gateway`**: the HTTP surface (`/discover`, `/wallet-status`, `/execute`). It holds
//!   the developer key and runs developer-wallet executions server-side.
//!
//! ## Components Overview
//!
//! - **[`catalog`]**: [`ServiceCatalog`](catalog::ServiceCatalog) lists the services a resource
//!   server offers. Failures are reported in the result, never raised.
//! - **[`mode`]**: [`SigningModeController`](mode::SigningModeController) decides who pays, the
//!   operator's developer wallet or the user's connected wallet.
//! - **[`signer`]**: the two [`WalletSigner`](signer::WalletSigner)s.
//! - **[`protocol`]**: the request / pay / settle state machine.
//! - **[`executor`]**: the two execution paths and the
//!   [`PaymentExecutor`](executor::PaymentExecutor) choosing between them.
//! - **[`progress`]**: the cancellable event stream and its NDJSON framing.
//!
//! ## Running an Execution
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use serde_json::json;
//! use url::Url;
//! use x402_executor::{
//!     executor::{GatewayClient, PaymentExecutor, RemoteExecution},
//!     mode::SigningModeController,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = GatewayClient::new(reqwest::Client::new(), Url::parse("http://localhost:3000")?);
//! let controller = SigningModeController::new().initialize(&gateway).await;
//!
//! let service = gateway
//!     .discover()
//!     .await?
//!     .services
//!     .into_iter()
//!     .next()
//!     .ok_or("no services")?;
//!
//! let executor = PaymentExecutor::new().with_developer_path(RemoteExecution::new(gateway));
//! let mut events = executor.execute(&controller, &service, json!({}))?;
//! while let Some(event) = events.next().await {
//!     println!("{:?}: {}", event.kind, event.message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod errors;
pub mod evm;
pub mod executor;
pub mod mode;
pub mod progress;
pub mod protocol;
pub mod schemes;
pub mod service;
pub mod session;
pub mod settlement;
pub mod signer;
pub mod wallet;
