//! The operator-held developer wallet and how its configuration is reported.

use serde::{Deserialize, Serialize};

use crate::{errors::ExecutionError, evm::EvmAddress, signer::DeveloperSigner};

/// Environment variable holding the developer private key.
pub const DEVELOPER_KEY_VAR: &str = "X402_DEVELOPER_PRIVATE_KEY";

/// Process-wide developer wallet, derived once at startup.
///
/// Absence is a valid state. An unusable key is kept as [`DeveloperWallet::Invalid`] with the
/// reason, so it can be reported without ever echoing the key.
#[derive(Debug, Clone, Default)]
pub enum DeveloperWallet {
    Configured(DeveloperSigner),
    #[default]
    NotConfigured,
    Invalid(String),
}

impl DeveloperWallet {
    pub fn from_private_key(private_key: Option<&str>) -> Self {
        let Some(key) = private_key.map(str::trim).filter(|k| !k.is_empty()) else {
            return DeveloperWallet::NotConfigured;
        };

        match DeveloperSigner::from_private_key(key) {
            Ok(signer) => DeveloperWallet::Configured(signer),
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("{DEVELOPER_KEY_VAR} is set but unusable: {err}");
                DeveloperWallet::Invalid(err.to_string())
            }
        }
    }

    /// Read [`DEVELOPER_KEY_VAR`] from the environment.
    pub fn from_env() -> Self {
        Self::from_private_key(std::env::var(DEVELOPER_KEY_VAR).ok().as_deref())
    }

    pub fn signer(&self) -> Option<&DeveloperSigner> {
        match self {
            DeveloperWallet::Configured(signer) => Some(signer),
            _ => None,
        }
    }

    pub fn address(&self) -> Option<EvmAddress> {
        self.signer().map(DeveloperSigner::wallet_address)
    }

    pub fn status(&self) -> WalletStatus {
        match self {
            DeveloperWallet::Configured(signer) => WalletStatus {
                configured: true,
                address: Some(signer.wallet_address()),
                error: None,
            },
            DeveloperWallet::NotConfigured => WalletStatus::default(),
            DeveloperWallet::Invalid(reason) => WalletStatus {
                configured: false,
                address: None,
                error: Some(reason.clone()),
            },
        }
    }
}

/// What `/wallet-status` reports about the developer wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStatus {
    pub configured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<EvmAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Anything that can tell whether a developer wallet is configured.
pub trait WalletStatusSource: Send + Sync {
    fn wallet_status(&self) -> impl Future<Output = Result<WalletStatus, ExecutionError>> + Send;
}

impl WalletStatusSource for DeveloperWallet {
    async fn wallet_status(&self) -> Result<WalletStatus, ExecutionError> {
        Ok(self.status())
    }
}
