//! Payment-gated services as published by a resource server.
//!
//! Entries are taken as the resource server sends them. A field that is missing, `null` or of
//! an unexpected type falls back to its default, so a partially-filled entry still makes it into
//! the catalog; addresses are only parsed once the executor actually needs them (see
//! [`Service::parse_address`]).

use std::fmt::Display;

use bon::Builder;
use serde::{Deserialize, Serialize};
use x402_core::types::{AnyJson, Record};

use crate::{errors::ExecutionError, evm::EvmAddress};

/// The on-chain action a settlement router runs after a successful payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookType {
    NftMint,
    RewardPoints,
    TransferSplit,
    #[default]
    #[serde(other)]
    Unknown,
}

impl HookType {
    /// The `supportingContracts` entry whose address is encoded as hook data, if any.
    pub fn supporting_contract_key(&self) -> Option<&'static str> {
        match self {
            HookType::NftMint => Some("nftContract"),
            HookType::RewardPoints => Some("rewardToken"),
            HookType::TransferSplit | HookType::Unknown => None,
        }
    }
}

impl Display for HookType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HookType::NftMint => "nft-mint",
            HookType::RewardPoints => "reward-points",
            HookType::TransferSplit => "transfer-split",
            HookType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Fallback payment terms a service advertises in the catalog.
///
/// Amounts are human-readable token amounts: a `facilitatorFee` of `"1"` is one whole token.
#[derive(Builder, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefaults {
    #[serde(default, deserialize_with = "lenient::string")]
    #[builder(into, default)]
    pub payment_amount: String,
    #[serde(default, deserialize_with = "lenient::string")]
    #[builder(into, default)]
    pub facilitator_fee: String,
    #[serde(default, deserialize_with = "lenient::string")]
    #[builder(into, default)]
    pub pay_to: String,
}

/// A payment-gated endpoint. Identity is `id`.
#[derive(Builder, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default, deserialize_with = "lenient::string")]
    #[builder(into)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    #[builder(into, default)]
    pub title: String,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    #[builder(into)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::hook_type")]
    #[builder(default)]
    pub hook_type: HookType,
    #[serde(default, deserialize_with = "lenient::string")]
    #[builder(into, default)]
    pub hook_address: String,
    #[serde(default, deserialize_with = "lenient::string")]
    #[builder(into, default)]
    pub network: String,
    #[serde(default, deserialize_with = "lenient::string")]
    #[builder(into, default)]
    pub settlement_router: String,
    #[serde(default, deserialize_with = "lenient::string")]
    #[builder(into, default)]
    pub usdc_address: String,
    #[serde(default, deserialize_with = "lenient::chain_id")]
    #[builder(default)]
    pub chain_id: u64,
    #[serde(
        default,
        deserialize_with = "lenient::contracts",
        skip_serializing_if = "Option::is_none"
    )]
    pub supporting_contracts: Option<Record<String>>,
    #[serde(
        default,
        deserialize_with = "lenient::defaults",
        skip_serializing_if = "Option::is_none"
    )]
    pub defaults: Option<ServiceDefaults>,
}

impl Service {
    /// Read one catalog entry. Only an entry that is not a JSON object is refused.
    pub fn from_entry(entry: AnyJson) -> Result<Service, serde_json::Error> {
        serde_json::from_value(entry)
    }

    /// Parse one of this service's address fields, naming the field on failure.
    pub fn parse_address(&self, field: &str, value: &str) -> Result<EvmAddress, ExecutionError> {
        value.parse().map_err(|err| {
            ExecutionError::Protocol(format!(
                "Service `{}` has an invalid {field} `{value}`: {err}",
                self.id
            ))
        })
    }

    pub fn supporting_contract(&self, name: &str) -> Option<&str> {
        self.supporting_contracts
            .as_ref()
            .and_then(|contracts| contracts.get(name))
            .map(String::as_str)
    }
}

/// Field readers that never fail on a value of the wrong type.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use x402_core::types::{AnyJson, Record};

    use super::{HookType, ServiceDefaults};

    fn text(value: AnyJson) -> Option<String> {
        match value {
            AnyJson::String(s) => Some(s),
            AnyJson::Number(n) => Some(n.to_string()),
            AnyJson::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(text(AnyJson::deserialize(deserializer)?).unwrap_or_default())
    }

    pub fn optional_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(text(AnyJson::deserialize(deserializer)?))
    }

    pub fn hook_type<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HookType, D::Error> {
        Ok(serde_json::from_value(AnyJson::deserialize(deserializer)?).unwrap_or_default())
    }

    /// A number, or a string holding one.
    pub fn chain_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        Ok(match AnyJson::deserialize(deserializer)? {
            AnyJson::Number(n) => n.as_u64().unwrap_or_default(),
            AnyJson::String(s) => s.trim().parse().unwrap_or_default(),
            _ => 0,
        })
    }

    pub fn contracts<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Record<String>>, D::Error> {
        Ok(match AnyJson::deserialize(deserializer)? {
            AnyJson::Object(map) => Some(
                map.into_iter()
                    .filter_map(|(name, address)| text(address).map(|a| (name, a)))
                    .collect(),
            ),
            _ => None,
        })
    }

    pub fn defaults<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<ServiceDefaults>, D::Error> {
        Ok(serde_json::from_value(AnyJson::deserialize(deserializer)?).ok())
    }
}
