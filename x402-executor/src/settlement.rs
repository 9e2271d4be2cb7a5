//! Settlement-router payments.
//!
//! A settlement router receives the transfer itself (`to` is the router, not the merchant),
//! pays the merchant and facilitator, then runs the service's hook. The parameters it needs are
//! bound into the EIP-3009 nonce as a commitment so they cannot be swapped after signing.

use alloy_core::sol_types::SolValue;
use alloy_primitives::{U256, keccak256};
use serde::{Deserialize, Serialize};
use x402_core::{
    transport::PaymentRequirements,
    types::{AmountValue, AnyJson},
};

use crate::{
    errors::ExecutionError,
    evm::EvmAddress,
    schemes::exact_evm::{
        AuthorizationRequest, ExactEvmAuthorization, Nonce, TimestampSeconds, TokenDomain,
    },
    service::Service,
};

/// Prefix of the commitment preimage.
pub const COMMITMENT_TAG: &[u8] = b"X402/settle/v1";

/// Seconds the authorization is back-dated by, to tolerate clock skew.
const VALID_AFTER_SKEW_SECS: u64 = 300;

/// Token decimals assumed when the terms do not say otherwise.
const DEFAULT_TOKEN_DECIMALS: u8 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementParams {
    pub settlement_router: EvmAddress,
    pub salt: Nonce,
    pub pay_to: EvmAddress,
    pub facilitator_fee: AmountValue,
    pub hook: EvmAddress,
    #[serde(with = "hex_bytes")]
    pub hook_data: Vec<u8>,
}

impl SettlementParams {
    /// The nonce committing the authorization to these settlement parameters.
    pub fn commitment(
        &self,
        chain_id: u64,
        token: EvmAddress,
        from: EvmAddress,
        value: AmountValue,
        valid_after: TimestampSeconds,
        valid_before: TimestampSeconds,
    ) -> Nonce {
        let mut preimage = Vec::with_capacity(COMMITMENT_TAG.len() + 32 * 7 + 20 * 5);
        preimage.extend_from_slice(COMMITMENT_TAG);
        preimage.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
        preimage.extend_from_slice(self.settlement_router.0.as_slice());
        preimage.extend_from_slice(token.0.as_slice());
        preimage.extend_from_slice(from.0.as_slice());
        preimage.extend_from_slice(&U256::from(value.0).to_be_bytes::<32>());
        preimage.extend_from_slice(&U256::from(valid_after.0).to_be_bytes::<32>());
        preimage.extend_from_slice(&U256::from(valid_before.0).to_be_bytes::<32>());
        preimage.extend_from_slice(&self.salt.0);
        preimage.extend_from_slice(self.pay_to.0.as_slice());
        preimage.extend_from_slice(&U256::from(self.facilitator_fee.0).to_be_bytes::<32>());
        preimage.extend_from_slice(self.hook.0.as_slice());
        preimage.extend_from_slice(keccak256(&self.hook_data).as_slice());

        Nonce(keccak256(&preimage).0)
    }
}

/// Build the authorization `payer` has to sign for `service` under `requirements`.
///
/// `now` is the current Unix time in seconds.
pub fn prepare_authorization(
    service: &Service,
    requirements: &PaymentRequirements,
    payer: EvmAddress,
    now: u64,
) -> Result<AuthorizationRequest, ExecutionError> {
    if service.chain_id == 0 {
        return Err(ExecutionError::Protocol(format!(
            "Service `{}` does not declare a chain id",
            service.id
        )));
    }

    let settlement_router = service.parse_address("settlementRouter", &service.settlement_router)?;
    let hook = service.parse_address("hookAddress", &service.hook_address)?;
    let token = match requirements.asset.parse::<EvmAddress>() {
        Ok(asset) => asset,
        Err(_) => service.parse_address("usdcAddress", &service.usdc_address)?,
    };

    let pay_to = {
        let from_defaults = service
            .defaults
            .as_ref()
            .map(|d| d.pay_to.clone())
            .filter(|p| !p.is_empty());
        let raw = requirements
            .extra_field::<String>("payTo")
            .or(from_defaults)
            .unwrap_or_else(|| requirements.pay_to.clone());
        service.parse_address("payTo", &raw)?
    };

    let decimals = requirements
        .extra_field::<u8>("decimals")
        .unwrap_or(DEFAULT_TOKEN_DECIMALS);
    // Terms carry smallest units; catalog defaults are token amounts like `paymentAmount`.
    let from_defaults = service
        .defaults
        .as_ref()
        .map(|d| d.facilitator_fee.as_str())
        .filter(|f| !f.is_empty());
    let facilitator_fee = match (extra_amount(requirements, "facilitatorFee"), from_defaults) {
        (Some(raw), _) => AmountValue::parse_units(&raw, decimals)?,
        (None, Some(raw)) => AmountValue::parse_decimal(raw, decimals)?,
        (None, None) => AmountValue::ZERO,
    };

    let value = requirements.max_amount_required;
    if facilitator_fee > value {
        return Err(ExecutionError::Protocol(format!(
            "Facilitator fee {facilitator_fee} exceeds the payment amount {value}"
        )));
    }

    let hook_data = hook_data(service)?;

    let settlement = SettlementParams {
        settlement_router,
        salt: Nonce(rand::random()),
        pay_to,
        facilitator_fee,
        hook,
        hook_data,
    };

    let valid_after = TimestampSeconds(now.saturating_sub(VALID_AFTER_SKEW_SECS));
    let valid_before = TimestampSeconds(now.saturating_add(requirements.max_timeout_seconds));
    let nonce = settlement.commitment(
        service.chain_id,
        token,
        payer,
        value,
        valid_after,
        valid_before,
    );

    let token_domain = match (
        requirements.extra_field::<String>("name"),
        requirements.extra_field::<String>("version"),
    ) {
        (Some(name), Some(version)) => TokenDomain { name, version },
        _ => TokenDomain::default(),
    };

    Ok(AuthorizationRequest {
        authorization: ExactEvmAuthorization {
            from: payer,
            to: settlement_router,
            value,
            valid_after,
            valid_before,
            nonce,
        },
        token_domain,
        chain_id: service.chain_id,
        verifying_contract: token,
        settlement,
    })
}

/// ABI-encoded hook arguments for the service's hook type.
fn hook_data(service: &Service) -> Result<Vec<u8>, ExecutionError> {
    let Some(key) = service.hook_type.supporting_contract_key() else {
        return Ok(Vec::new());
    };

    match service.supporting_contract(key) {
        Some(raw) => {
            let contract = service.parse_address(key, raw)?;
            Ok(contract.0.abi_encode())
        }
        None => {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                service = %service.id,
                hook_type = %service.hook_type,
                "No `{key}` supporting contract; sending empty hook data"
            );
            Ok(Vec::new())
        }
    }
}

/// Read an amount out of `extra`, whether it was sent as a string or a number.
fn extra_amount(requirements: &PaymentRequirements, key: &str) -> Option<String> {
    match requirements.extra_field::<AnyJson>(key)? {
        AnyJson::String(s) if !s.is_empty() => Some(s),
        AnyJson::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}
