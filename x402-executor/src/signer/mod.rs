//! Wallet signers: who pays for an execution.
//!
//! - [`DeveloperSigner`]: an operator-held key, signs immediately.
//! - [`ConnectedSigner`]: the end user's own wallet behind a [`WalletConnector`]; may wait on a
//!   human to confirm.

mod connected;
mod developer;

use std::time::Duration;

pub use connected::*;
pub use developer::*;

use crate::{
    evm::EvmAddress,
    mode::SigningMode,
    schemes::exact_evm::{AuthorizationRequest, ExactEvmPayload},
};

/// Produces a signed payment authorization for a prepared request.
pub trait WalletSigner: Send + Sync {
    /// Which signing mode this signer serves.
    fn mode(&self) -> SigningMode;

    /// The paying address, or `None` if no wallet is available right now.
    fn address(&self) -> Option<EvmAddress>;

    fn sign(
        &self,
        request: AuthorizationRequest,
    ) -> impl Future<Output = Result<ExactEvmPayload, SigningError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    /// The user declined to sign in their wallet.
    #[error("Payment was rejected in the wallet")]
    Rejected,

    #[error("Wallet did not respond within {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("No wallet is connected")]
    NotConnected,

    #[error("Invalid developer key: {0}")]
    InvalidKey(String),

    #[error("Authorization is for {expected}, but the signature recovers to {actual}")]
    WrongSigner {
        expected: EvmAddress,
        actual: EvmAddress,
    },

    #[error("Signer failed: {0}")]
    Failed(String),
}
