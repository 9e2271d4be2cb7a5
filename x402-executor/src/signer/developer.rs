use std::fmt::Debug;

use alloy_signer::Signer as AlloySigner;
use alloy_signer_local::PrivateKeySigner;

use crate::{
    evm::{EvmAddress, EvmSignature},
    mode::SigningMode,
    schemes::exact_evm::{AuthorizationRequest, ExactEvmPayload},
    signer::{SigningError, WalletSigner},
};

/// Signs with an operator-held private key, without user interaction.
///
/// The key never leaves this type: it is not serializable and `Debug` prints the address only.
#[derive(Clone)]
pub struct DeveloperSigner {
    signer: PrivateKeySigner,
    address: EvmAddress,
}

impl DeveloperSigner {
    /// Load a hex-encoded secp256k1 key, with or without a `0x` prefix.
    pub fn from_private_key(private_key: &str) -> Result<Self, SigningError> {
        let key = private_key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);
        if key.is_empty() {
            return Err(SigningError::InvalidKey("key is empty".to_string()));
        }

        let signer = key
            .parse::<PrivateKeySigner>()
            .map_err(|err| SigningError::InvalidKey(err.to_string()))?;

        Ok(Self::from_signer(signer))
    }

    pub fn from_signer(signer: PrivateKeySigner) -> Self {
        let address = EvmAddress(signer.address());
        DeveloperSigner { signer, address }
    }

    pub fn wallet_address(&self) -> EvmAddress {
        self.address
    }
}

impl Debug for DeveloperSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeveloperSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl WalletSigner for DeveloperSigner {
    fn mode(&self) -> SigningMode {
        SigningMode::DeveloperWallet
    }

    fn address(&self) -> Option<EvmAddress> {
        Some(self.address)
    }

    async fn sign(&self, request: AuthorizationRequest) -> Result<ExactEvmPayload, SigningError> {
        if request.authorization.from != self.address {
            return Err(SigningError::Failed(format!(
                "authorization is for {}, not the developer wallet",
                request.authorization.from
            )));
        }

        let hash = request.signing_hash();
        let signature = self
            .signer
            .sign_hash(&hash)
            .await
            .map_err(|err| SigningError::Failed(err.to_string()))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(address = %self.address, "Developer wallet signed authorization");

        Ok(request.into_payload(EvmSignature(signature)))
    }
}
