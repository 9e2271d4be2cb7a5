use std::{sync::Arc, time::Duration};

use x402_core::types::AnyJson;

use crate::{
    config::{DEFAULT_REQUEST_TIMEOUT, ExecutorConfig, ResourceServer},
    errors::ConfigError,
    executor::ExecutionPath,
    mode::SigningMode,
    progress::{ProgressEvent, ProgressStream, progress_channel},
    protocol::PaymentProtocol,
    service::Service,
    signer::WalletSigner,
};

/// Runs the protocol in this process with the given signer.
///
/// With a [`ConnectedSigner`](crate::signer::ConnectedSigner) this is the connected-wallet
/// path. The gateway runs the developer-wallet path the same way, with a
/// [`DeveloperSigner`](crate::signer::DeveloperSigner).
#[derive(Debug)]
pub struct LocalExecution<S> {
    client: reqwest::Client,
    resource_server: ResourceServer,
    request_timeout: Duration,
    signer: Arc<S>,
}

impl<S> Clone for LocalExecution<S> {
    fn clone(&self) -> Self {
        LocalExecution {
            client: self.client.clone(),
            resource_server: self.resource_server.clone(),
            request_timeout: self.request_timeout,
            signer: self.signer.clone(),
        }
    }
}

impl<S: WalletSigner + 'static> LocalExecution<S> {
    pub fn new(client: reqwest::Client, resource_server: ResourceServer, signer: S) -> Self {
        LocalExecution {
            client,
            resource_server,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            signer: Arc::new(signer),
        }
    }

    pub fn from_config(config: &ExecutorConfig, signer: S) -> Result<Self, ConfigError> {
        Ok(
            Self::new(config.http_client()?, config.resource_server(), signer)
                .with_request_timeout(config.request_timeout),
        )
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }
}

impl<S: WalletSigner + 'static> ExecutionPath for LocalExecution<S> {
    fn mode(&self) -> SigningMode {
        self.signer.mode()
    }

    fn execute(&self, service: &Service, query: AnyJson) -> ProgressStream {
        let url = match self.resource_server.require() {
            Ok(url) => url.clone(),
            Err(err) => return ProgressStream::once(ProgressEvent::error(err.to_string())),
        };

        let protocol = PaymentProtocol::new(self.client.clone(), url)
            .with_request_timeout(self.request_timeout);
        let signer = self.signer.clone();
        let service = service.clone();
        let (sink, stream) = progress_channel();

        #[cfg(feature = "tracing")]
        let span = tracing::info_span!("execution", service = %service.id, mode = %signer.mode());

        let task = async move {
            protocol.run(&service, &query, signer.as_ref(), &sink).await;
        };

        #[cfg(feature = "tracing")]
        let task = tracing::Instrument::instrument(task, span);

        tokio::spawn(task);
        stream
    }
}
