//! Types exchanged between a buyer and a resource server over HTTP.

use bon::Builder;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;

use crate::types::{AmountValue, AnyJson, X402Version};

/// Request header carrying the proof of payment, X402 version 1.
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";
/// Response header carrying the settlement receipt, X402 version 1.
pub const X_PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";
/// Response header carrying the payment terms, X402 version 2.
pub const PAYMENT_REQUIRED_HEADER: &str = "PAYMENT-REQUIRED";
/// Request header carrying the proof of payment, X402 version 2.
pub const PAYMENT_SIGNATURE_HEADER: &str = "PAYMENT-SIGNATURE";
/// Response header carrying the settlement receipt, X402 version 2.
pub const PAYMENT_RESPONSE_HEADER: &str = "PAYMENT-RESPONSE";

/// The name of the only scheme this workspace can pay with.
pub const EXACT_SCHEME: &str = "exact";

/// One acceptable way of paying for a resource.
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Scheme name, defined in "schemes" protocol
    #[builder(into)]
    pub scheme: String,
    /// Network name, defined in "schemes" protocol
    #[builder(into)]
    pub network: String,
    /// Maximum amount required for the payment in smallest units
    #[serde(alias = "amount")]
    #[builder(into)]
    pub max_amount_required: AmountValue,
    /// Resource URL the payment unlocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Url>,
    /// Description of the resource
    #[serde(default)]
    #[builder(into, default)]
    pub description: String,
    /// MIME type of the resource
    #[serde(default)]
    #[builder(into, default)]
    pub mime_type: String,
    /// Destination address or account to pay to
    #[builder(into)]
    pub pay_to: String,
    /// Maximum timeout in seconds for the payment to be completed
    #[serde(default = "default_max_timeout_seconds")]
    #[builder(default = default_max_timeout_seconds())]
    pub max_timeout_seconds: u64,
    /// Asset address or identifier
    #[builder(into)]
    pub asset: String,
    /// Extra fields for extensibility
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<AnyJson>,
}

fn default_max_timeout_seconds() -> u64 {
    300
}

impl PaymentRequirements {
    /// Read a typed field out of `extra`, if present and well-formed.
    pub fn extra_field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.extra
            .as_ref()
            .and_then(|extra| extra.get(key))
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// The terms a resource server answers with alongside `402 Payment Required`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    pub x402_version: X402Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
}

impl PaymentRequired {
    /// Pick the first option matching `scheme` on `network`.
    ///
    /// Network names are compared case-insensitively.
    pub fn select(&self, scheme: &str, network: &str) -> Option<&PaymentRequirements> {
        self.accepts
            .iter()
            .find(|pr| pr.scheme == scheme && pr.network.eq_ignore_ascii_case(network))
    }
}

/// The proof of payment a buyer attaches to the resubmitted request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: X402Version,
    pub scheme: String,
    pub network: String,
    pub payload: AnyJson,
}

/// The settlement receipt a resource server returns once the payment is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    pub success: bool,
    #[serde(default)]
    pub transaction: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub payer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::types::Base64EncodedHeader;

    use super::*;

    fn v1_body() -> serde_json::Value {
        json!({
            "x402Version": 1,
            "error": "X-PAYMENT header is required",
            "accepts": [
                {
                    "scheme": "exact",
                    "network": "base-sepolia",
                    "maxAmountRequired": "10000",
                    "resource": "https://example.com/api/x402/services/svc1",
                    "description": "Mint an NFT",
                    "mimeType": "application/json",
                    "payTo": "0x3CB9B3bBfde8501f411bB69Ad3DC07908ED0dE20",
                    "maxTimeoutSeconds": 600,
                    "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
                    "extra": { "name": "USDC", "version": "2", "facilitatorFee": "0.01" }
                }
            ]
        })
    }

    #[test]
    fn parse_v1_payment_required() {
        let required: PaymentRequired = serde_json::from_value(v1_body()).unwrap();
        assert_eq!(required.x402_version, X402Version::V1);

        let selected = required.select(EXACT_SCHEME, "Base-Sepolia").unwrap();
        assert_eq!(selected.max_amount_required, AmountValue(10_000));
        assert_eq!(selected.max_timeout_seconds, 600);
        assert_eq!(
            selected.extra_field::<String>("facilitatorFee").as_deref(),
            Some("0.01")
        );
        assert!(required.select(EXACT_SCHEME, "base").is_none());
        assert!(required.select("upto", "base-sepolia").is_none());
    }

    #[test]
    fn v2_terms_use_amount_and_defaults() {
        let header = Base64EncodedHeader::encode(&json!({
            "x402Version": 2,
            "accepts": [{
                "scheme": "exact",
                "network": "base",
                "amount": 5000,
                "payTo": "0x3CB9B3bBfde8501f411bB69Ad3DC07908ED0dE20",
                "asset": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
            }]
        }))
        .unwrap();

        let required: PaymentRequired = header.decode().unwrap();
        let pr = &required.accepts[0];
        assert_eq!(required.x402_version, X402Version::V2);
        assert_eq!(pr.max_amount_required, AmountValue(5000));
        assert_eq!(pr.max_timeout_seconds, 300);
        assert!(pr.resource.is_none());
        assert!(pr.description.is_empty());
    }

    #[test]
    fn missing_pay_to_is_rejected() {
        let mut body = v1_body();
        body["accepts"][0]
            .as_object_mut()
            .unwrap()
            .remove("payTo");
        assert!(serde_json::from_value::<PaymentRequired>(body).is_err());
    }

    #[test]
    fn build_requirements() {
        let pr = PaymentRequirements::builder()
            .scheme(EXACT_SCHEME)
            .network("base-sepolia")
            .max_amount_required(1000u64)
            .pay_to("0x3CB9B3bBfde8501f411bB69Ad3DC07908ED0dE20")
            .asset("0x036CbD53842c5426634e7929541eC2318f3dCF7e")
            .build();

        let json = serde_json::to_value(&pr).unwrap();
        assert_eq!(json["maxAmountRequired"], json!("1000"));
        assert_eq!(json["maxTimeoutSeconds"], json!(300));
        assert!(json.get("extra").is_none());
    }
}
