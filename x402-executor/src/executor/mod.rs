//! Choosing and running an execution path.
//!
//! Both paths produce the same [`ProgressStream`]; which one runs is decided by the session's
//! [`SigningModeController`]:
//!
//! - developer wallet: [`RemoteExecution`] asks the gateway to run the protocol server-side,
//!   where the developer key lives, and decodes its NDJSON event stream.
//! - connected wallet: [`LocalExecution`] runs the protocol in this process and lets the user's
//!   wallet sign.

mod local;
mod remote;

use std::sync::Arc;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use x402_core::types::AnyJson;

pub use local::*;
pub use remote::*;

use crate::{
    errors::SessionError,
    mode::{SigningMode, SigningModeController},
    progress::ProgressStream,
    service::Service,
    session::ExecutionSession,
};

/// One way of running an execution.
pub trait ExecutionPath: Send + Sync {
    /// The signing mode this path pays with.
    fn mode(&self) -> SigningMode;

    /// Start executing `service` and return its events. Never fails up front: problems are
    /// reported as a terminal `error` event on the stream.
    fn execute(&self, service: &Service, query: AnyJson) -> ProgressStream;
}

/// Body of `POST /execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub service_id: String,
    #[serde(default = "empty_query")]
    pub query: AnyJson,
}

fn empty_query() -> AnyJson {
    json!({})
}

/// Routes executions to the path matching the active signing mode.
#[derive(Clone, Default)]
pub struct PaymentExecutor {
    developer: Option<Arc<dyn ExecutionPath>>,
    connected: Option<Arc<dyn ExecutionPath>>,
}

impl PaymentExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_developer_path(mut self, path: impl ExecutionPath + 'static) -> Self {
        self.developer = Some(Arc::new(path));
        self
    }

    pub fn with_connected_path(mut self, path: impl ExecutionPath + 'static) -> Self {
        self.connected = Some(Arc::new(path));
        self
    }

    /// Start an execution with whichever path `controller` currently selects.
    pub fn execute(
        &self,
        controller: &SigningModeController,
        service: &Service,
        query: AnyJson,
    ) -> Result<ProgressStream, SessionError> {
        let mode = controller.mode().ok_or(SessionError::ModeNotResolved)?;
        let path = match mode {
            SigningMode::DeveloperWallet => self.developer.as_ref(),
            SigningMode::ConnectedWallet => self.connected.as_ref(),
        }
        .ok_or(SessionError::PathUnavailable(mode))?;

        #[cfg(feature = "tracing")]
        tracing::info!(service = %service.id, %mode, "Starting execution");

        Ok(path.execute(service, query))
    }

    /// Run one execution to the end, recording its events into `session`.
    ///
    /// Rejected without side effects if `session` already has an execution in flight.
    pub async fn run(
        &self,
        session: &mut ExecutionSession,
        controller: &SigningModeController,
        service: &Service,
        query: AnyJson,
    ) -> Result<(), SessionError> {
        let mode = controller.mode().ok_or(SessionError::ModeNotResolved)?;
        session.begin(service.id.clone(), mode)?;

        let mut events = match self.execute(controller, service, query) {
            Ok(events) => events,
            Err(err) => {
                session.finish();
                return Err(err);
            }
        };
        while let Some(event) = events.next().await {
            session.record(event);
        }
        session.finish();
        Ok(())
    }
}

impl std::fmt::Debug for PaymentExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentExecutor")
            .field("developer", &self.developer.as_ref().map(|p| p.mode()))
            .field("connected", &self.connected.as_ref().map(|p| p.mode()))
            .finish()
    }
}
