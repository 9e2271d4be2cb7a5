use std::time::Duration;

use crate::{
    evm::{EvmAddress, EvmSignature},
    mode::SigningMode,
    schemes::exact_evm::{AuthorizationRequest, ExactEvmPayload},
    signer::{SigningError, WalletSigner},
};

/// Default time a user gets to confirm a payment in their wallet.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Why a connected wallet did not return a signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectorError {
    #[error("user rejected the request")]
    UserRejected,
    #[error("wallet disconnected")]
    Disconnected,
    #[error("{0}")]
    Other(String),
}

/// The end user's wallet, as supplied by the embedding application.
///
/// Implementations typically forward [`AuthorizationRequest::typed_data`] to a browser or
/// mobile wallet and wait for the user to approve it.
pub trait WalletConnector: Send + Sync {
    /// The account currently connected, if any.
    fn account(&self) -> Option<EvmAddress>;

    /// Ask the user to sign the authorization. May wait on a human for as long as it takes.
    fn sign_typed_data(
        &self,
        request: &AuthorizationRequest,
    ) -> impl Future<Output = Result<EvmSignature, ConnectorError>> + Send;
}

/// Delegates signing to the user's own wallet.
#[derive(Debug, Clone)]
pub struct ConnectedSigner<C: WalletConnector> {
    pub connector: C,
    pub confirmation_timeout: Duration,
}

impl<C: WalletConnector> ConnectedSigner<C> {
    pub fn new(connector: C) -> Self {
        ConnectedSigner {
            connector,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }
}

impl<C: WalletConnector> WalletSigner for ConnectedSigner<C> {
    fn mode(&self) -> SigningMode {
        SigningMode::ConnectedWallet
    }

    fn address(&self) -> Option<EvmAddress> {
        self.connector.account()
    }

    async fn sign(&self, request: AuthorizationRequest) -> Result<ExactEvmPayload, SigningError> {
        let account = self.connector.account().ok_or(SigningError::NotConnected)?;
        if request.authorization.from != account {
            return Err(SigningError::Failed(format!(
                "authorization is for {}, but the connected account is {account}",
                request.authorization.from
            )));
        }

        #[cfg(feature = "tracing")]
        tracing::info!(%account, "Waiting for wallet confirmation");

        let signature = tokio::time::timeout(
            self.confirmation_timeout,
            self.connector.sign_typed_data(&request),
        )
        .await
        .map_err(|_| SigningError::TimedOut(self.confirmation_timeout))?
        .map_err(|err| match err {
            ConnectorError::UserRejected => SigningError::Rejected,
            ConnectorError::Disconnected => SigningError::NotConnected,
            ConnectorError::Other(reason) => SigningError::Failed(reason),
        })?;

        // Wallets are outside our control; make sure the signature is actually usable.
        let recovered = signature
            .0
            .recover_address_from_prehash(&request.signing_hash())
            .map_err(|err| SigningError::Failed(format!("unrecoverable signature: {err}")))?;
        if recovered != account.0 {
            return Err(SigningError::WrongSigner {
                expected: account,
                actual: EvmAddress(recovered),
            });
        }

        Ok(request.into_payload(signature))
    }
}
