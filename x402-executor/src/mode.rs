//! Which wallet pays: the end user's connected wallet or the operator's developer wallet.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    evm::EvmAddress,
    wallet::{WalletStatus, WalletStatusSource},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigningMode {
    ConnectedWallet,
    DeveloperWallet,
}

impl Display for SigningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningMode::ConnectedWallet => f.write_str("connected-wallet"),
            SigningMode::DeveloperWallet => f.write_str("developer-wallet"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControllerState {
    /// Still waiting on the developer-wallet probe; no execution may start.
    #[default]
    Loading,
    Resolved(SigningMode),
}

/// Session-scoped signing-mode state.
///
/// Transitions consume the controller and return the next one, so the caller always holds
/// exactly one value and there is no shared mutable mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SigningModeController {
    state: ControllerState,
    developer_address: Option<EvmAddress>,
}

impl SigningModeController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the initial mode from a wallet status: developer mode when a developer wallet is
    /// configured, connected mode otherwise.
    pub fn resolve(self, status: &WalletStatus) -> Self {
        if self.state != ControllerState::Loading {
            return self;
        }

        match (status.configured, status.address) {
            (true, Some(address)) => SigningModeController {
                state: ControllerState::Resolved(SigningMode::DeveloperWallet),
                developer_address: Some(address),
            },
            _ => SigningModeController {
                state: ControllerState::Resolved(SigningMode::ConnectedWallet),
                developer_address: None,
            },
        }
    }

    /// Query `source` once and resolve the initial mode. A failed query falls back to connected
    /// mode with no developer address.
    pub async fn initialize(self, source: &impl WalletStatusSource) -> Self {
        if self.state != ControllerState::Loading {
            return self;
        }

        match source.wallet_status().await {
            Ok(status) => self.resolve(&status),
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Wallet status unavailable, using connected wallet: {err}");
                #[cfg(not(feature = "tracing"))]
                let _ = err;
                self.resolve(&WalletStatus::default())
            }
        }
    }

    /// Switch modes. Developer mode without a configured developer wallet, and any switch while
    /// still loading, leave the controller unchanged.
    pub fn set_mode(self, target: SigningMode) -> Self {
        match (self.state, target) {
            (ControllerState::Loading, _) => self,
            (_, SigningMode::DeveloperWallet) if self.developer_address.is_none() => self,
            (_, target) => SigningModeController {
                state: ControllerState::Resolved(target),
                ..self
            },
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// The active mode, or `None` while loading.
    pub fn mode(&self) -> Option<SigningMode> {
        match self.state {
            ControllerState::Loading => None,
            ControllerState::Resolved(mode) => Some(mode),
        }
    }

    pub fn is_developer_wallet_configured(&self) -> bool {
        self.developer_address.is_some()
    }

    pub fn developer_address(&self) -> Option<EvmAddress> {
        self.developer_address
    }

    /// The address that will pay: the developer wallet in developer mode, otherwise whatever
    /// the user has connected.
    pub fn active_wallet_address(&self, connected: Option<EvmAddress>) -> Option<EvmAddress> {
        match self.mode() {
            Some(SigningMode::DeveloperWallet) => self.developer_address,
            _ => connected,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{errors::ExecutionError, wallet::DeveloperWallet};

    use super::*;

    struct Unreachable;

    impl WalletStatusSource for Unreachable {
        async fn wallet_status(&self) -> Result<WalletStatus, ExecutionError> {
            Err(ExecutionError::Network("connection refused".to_string()))
        }
    }

    fn developer_address() -> EvmAddress {
        "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".parse().unwrap()
    }

    fn configured() -> WalletStatus {
        WalletStatus {
            configured: true,
            address: Some(developer_address()),
            error: None,
        }
    }

    #[test]
    fn mode_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(SigningMode::DeveloperWallet).unwrap(),
            serde_json::json!("developer-wallet")
        );
        assert_eq!(SigningMode::ConnectedWallet.to_string(), "connected-wallet");
    }

    #[tokio::test]
    async fn unconfigured_wallet_starts_in_connected_mode() {
        let controller = SigningModeController::new()
            .initialize(&DeveloperWallet::NotConfigured)
            .await;

        assert_eq!(controller.mode(), Some(SigningMode::ConnectedWallet));
        assert!(!controller.is_developer_wallet_configured());
    }

    #[tokio::test]
    async fn failed_probe_falls_back_to_connected_mode() {
        let controller = SigningModeController::new().initialize(&Unreachable).await;

        assert_eq!(controller.mode(), Some(SigningMode::ConnectedWallet));
        assert_eq!(controller.developer_address(), None);
    }

    #[test]
    fn configured_wallet_starts_in_developer_mode() {
        let controller = SigningModeController::new().resolve(&configured());

        assert_eq!(controller.mode(), Some(SigningMode::DeveloperWallet));
        assert_eq!(controller.active_wallet_address(None), Some(developer_address()));
    }

    #[test]
    fn developer_mode_is_refused_without_wallet() {
        let controller = SigningModeController::new().resolve(&WalletStatus::default());

        let once = controller.set_mode(SigningMode::DeveloperWallet);
        let twice = once.set_mode(SigningMode::DeveloperWallet);

        assert_eq!(once, controller);
        assert_eq!(twice, controller);
        assert_eq!(twice.mode(), Some(SigningMode::ConnectedWallet));
    }

    #[test]
    fn switching_is_ignored_while_loading() {
        let controller = SigningModeController::new().set_mode(SigningMode::ConnectedWallet);
        assert_eq!(controller.state(), ControllerState::Loading);
        assert_eq!(controller.mode(), None);
    }

    #[test]
    fn switching_between_modes() {
        let user: EvmAddress = "0x0000000000000000000000000000000000000abc".parse().unwrap();
        let controller = SigningModeController::new().resolve(&configured());

        let connected = controller.set_mode(SigningMode::ConnectedWallet);
        assert_eq!(connected.mode(), Some(SigningMode::ConnectedWallet));
        assert_eq!(connected.active_wallet_address(Some(user)), Some(user));
        assert_eq!(connected.active_wallet_address(None), None);

        let back = connected.set_mode(SigningMode::DeveloperWallet);
        assert_eq!(back.mode(), Some(SigningMode::DeveloperWallet));
        assert_eq!(back.active_wallet_address(Some(user)), Some(developer_address()));
    }

    #[test]
    fn initial_resolution_happens_once() {
        let controller = SigningModeController::new()
            .resolve(&WalletStatus::default())
            .resolve(&configured());
        assert_eq!(controller.mode(), Some(SigningMode::ConnectedWallet));
    }
}
