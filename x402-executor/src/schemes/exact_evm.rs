//! The `exact` scheme on EVM networks: an EIP-3009 `TransferWithAuthorization` signed over
//! EIP-712.

use std::{
    borrow::Cow,
    fmt::{Debug, Display},
    str::FromStr,
};

use alloy_core::{
    sol,
    sol_types::{Eip712Domain, SolStruct},
};
use alloy_primitives::{B256, FixedBytes, U256};
use serde::{Deserialize, Serialize};
use serde_json::json;
use x402_core::types::AmountValue;

use crate::{
    evm::{EvmAddress, EvmSignature},
    settlement::SettlementParams,
};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce(pub [u8; 32]);

impl Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

impl Display for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Nonce {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Nonce(arr))
    }
}

impl Serialize for Nonce {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Nonce {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Nonce::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimestampSeconds(pub u64);

impl Display for TimestampSeconds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for TimestampSeconds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TimestampSeconds({})", self.0)
    }
}

impl Serialize for TimestampSeconds {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimestampSeconds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let seconds = s.parse::<u64>().map_err(serde::de::Error::custom)?;
        Ok(TimestampSeconds(seconds))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmAuthorization {
    pub from: EvmAddress,
    pub to: EvmAddress,
    pub value: AmountValue,
    pub valid_after: TimestampSeconds,
    pub valid_before: TimestampSeconds,
    pub nonce: Nonce,
}

/// The `payload` of a payment sent through a settlement router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: EvmSignature,
    pub authorization: ExactEvmAuthorization,
    pub settlement: SettlementParams,
}

sol!(
    /// EIP-3009 `TransferWithAuthorization`, as hashed by USDC-style tokens.
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

impl From<&ExactEvmAuthorization> for TransferWithAuthorization {
    fn from(authorization: &ExactEvmAuthorization) -> Self {
        TransferWithAuthorization {
            from: authorization.from.0,
            to: authorization.to.0,
            value: U256::from(authorization.value.0),
            validAfter: U256::from(authorization.valid_after.0),
            validBefore: U256::from(authorization.valid_before.0),
            nonce: FixedBytes(authorization.nonce.0),
        }
    }
}

/// Name and version of the token's EIP-712 domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDomain {
    pub name: String,
    pub version: String,
}

impl Default for TokenDomain {
    fn default() -> Self {
        TokenDomain {
            name: "USD Coin".to_string(),
            version: "2".to_string(),
        }
    }
}

/// Everything a wallet needs to authorize one payment.
///
/// Signers only ever see this request; they do not construct the authorization themselves.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub authorization: ExactEvmAuthorization,
    pub token_domain: TokenDomain,
    pub chain_id: u64,
    pub verifying_contract: EvmAddress,
    pub settlement: SettlementParams,
}

impl AuthorizationRequest {
    pub fn eip712_domain(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(Cow::Owned(self.token_domain.name.clone())),
            Some(Cow::Owned(self.token_domain.version.clone())),
            Some(U256::from(self.chain_id)),
            Some(self.verifying_contract.0),
            None,
        )
    }

    /// The EIP-712 digest the signature must cover.
    pub fn signing_hash(&self) -> B256 {
        TransferWithAuthorization::from(&self.authorization).eip712_signing_hash(&self.eip712_domain())
    }

    /// The request as `eth_signTypedData_v4` JSON, for wallets that sign typed data themselves.
    pub fn typed_data(&self) -> serde_json::Value {
        json!({
            "types": {
                "EIP712Domain": [
                    { "name": "name", "type": "string" },
                    { "name": "version", "type": "string" },
                    { "name": "chainId", "type": "uint256" },
                    { "name": "verifyingContract", "type": "address" }
                ],
                "TransferWithAuthorization": [
                    { "name": "from", "type": "address" },
                    { "name": "to", "type": "address" },
                    { "name": "value", "type": "uint256" },
                    { "name": "validAfter", "type": "uint256" },
                    { "name": "validBefore", "type": "uint256" },
                    { "name": "nonce", "type": "bytes32" }
                ]
            },
            "primaryType": "TransferWithAuthorization",
            "domain": {
                "name": self.token_domain.name,
                "version": self.token_domain.version,
                "chainId": self.chain_id,
                "verifyingContract": self.verifying_contract,
            },
            "message": self.authorization,
        })
    }

    /// Attach a signature, producing the payload sent to the resource server.
    pub fn into_payload(self, signature: EvmSignature) -> ExactEvmPayload {
        ExactEvmPayload {
            signature,
            authorization: self.authorization,
            settlement: self.settlement,
        }
    }
}
