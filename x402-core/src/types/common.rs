//! Miscellaneous common types used throughout the X402 codebase.

use std::fmt::Display;

use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::errors::Result;

/// Represents an key-value pair in the X402 protocol. The key is a `String`.
pub type Record<V> = std::collections::HashMap<String, V>;

/// Represents any JSON value. Used for serializing/deserializing arbitrary JSON data.
pub type AnyJson = serde_json::Value;

/// Represents the X402 protocol version.
///
/// Version 1 servers describe their terms in the 402 response body and expect the proof of
/// payment in `X-PAYMENT`; version 2 servers use the `PAYMENT-REQUIRED` / `PAYMENT-SIGNATURE`
/// header pair instead.
///
/// ```
/// use serde::{Serialize, Deserialize};
/// use x402_core::types::X402Version;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct Example {
///     x402_version: X402Version,
/// }
///
/// let example: Example = serde_json::from_value(serde_json::json!({
///     "x402Version": 2,
/// })).unwrap();
/// assert_eq!(example.x402_version, X402Version::V2);
///
/// let json = serde_json::to_value(&example).unwrap();
/// assert_eq!(json.get("x402Version").unwrap(), &serde_json::json!(2));
///
/// assert!(serde_json::from_value::<Example>(serde_json::json!({ "x402Version": 3 })).is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum X402Version {
    /// `"x402Version": 1`.
    #[default]
    V1,
    /// `"x402Version": 2`.
    V2,
}

impl X402Version {
    /// The request header carrying the proof of payment for this version.
    pub fn payment_header(&self) -> &'static str {
        match self {
            X402Version::V1 => crate::transport::X_PAYMENT_HEADER,
            X402Version::V2 => crate::transport::PAYMENT_SIGNATURE_HEADER,
        }
    }

    /// The response header carrying the settlement receipt for this version.
    pub fn settlement_header(&self) -> &'static str {
        match self {
            X402Version::V1 => crate::transport::X_PAYMENT_RESPONSE_HEADER,
            X402Version::V2 => crate::transport::PAYMENT_RESPONSE_HEADER,
        }
    }
}

impl Serialize for X402Version {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            X402Version::V1 => serializer.serialize_u8(1),
            X402Version::V2 => serializer.serialize_u8(2),
        }
    }
}

impl<'de> Deserialize<'de> for X402Version {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v = i64::deserialize(deserializer)?;
        match v {
            1 => Ok(X402Version::V1),
            2 => Ok(X402Version::V2),
            _ => Err(serde::de::Error::custom(format!(
                "Unsupported X402 version {}; expected 1 or 2",
                v
            ))),
        }
    }
}

impl Display for X402Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            X402Version::V1 => write!(f, "1"),
            X402Version::V2 => write!(f, "2"),
        }
    }
}

/// A base64-encoded JSON document carried in an X402 header.
///
/// ```
/// use x402_core::types::Base64EncodedHeader;
///
/// let header = Base64EncodedHeader::encode(&serde_json::json!({ "success": true })).unwrap();
/// let back: serde_json::Value = header.decode().unwrap();
/// assert_eq!(back["success"], true);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64EncodedHeader(pub String);

impl Base64EncodedHeader {
    /// Serialize `value` to JSON and base64-encode it.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self> {
        let json = serde_json::to_string(value)?;
        Ok(Base64EncodedHeader(BASE64_STANDARD.encode(json)))
    }

    /// Base64-decode the header and parse the JSON inside.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes = BASE64_STANDARD.decode(self.0.trim())?;
        let json = String::from_utf8(bytes)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Base64EncodedHeader {
    fn from(value: &str) -> Self {
        Base64EncodedHeader(value.to_string())
    }
}

impl Display for Base64EncodedHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_follow_version() {
        assert_eq!(X402Version::V1.payment_header(), "X-PAYMENT");
        assert_eq!(X402Version::V2.payment_header(), "PAYMENT-SIGNATURE");
        assert_eq!(X402Version::V1.settlement_header(), "X-PAYMENT-RESPONSE");
        assert_eq!(X402Version::V2.settlement_header(), "PAYMENT-RESPONSE");
    }

    #[test]
    fn decode_rejects_non_base64() {
        let header = Base64EncodedHeader::from("not base64 at all!");
        assert!(header.decode::<serde_json::Value>().is_err());
    }
}
