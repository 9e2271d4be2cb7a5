//! [`AmountValue`] represents a monetary amount in the X402 protocol.
//!
//! Amounts travel as decimal strings of the asset's smallest unit (`"10000"` is 0.01 USDC).
//! Some resource servers send plain JSON numbers instead, so both are accepted when reading.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize, de::Visitor};

use crate::errors::Error;

/// Represents a monetary amount in the X402 protocol, in the asset's smallest units.
///
/// Uses a `u128` internally to support large values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AmountValue(pub u128);

macro_rules! impl_amount_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for AmountValue {
                fn from(value: $t) -> Self {
                    AmountValue(value as u128)
                }
            }
        )*
    };
}

impl_amount_from!(u8, u16, u32, u64, u128);

impl AmountValue {
    pub const ZERO: AmountValue = AmountValue(0);

    /// Parse an amount that may be written either way, as it appears in payment terms.
    ///
    /// Strings without a decimal point are taken as already being in smallest units, so
    /// `parse_units("50000", 6)` is `50000`, while `parse_units("0.05", 6)` is `50000` too.
    ///
    /// ```
    /// use x402_core::types::AmountValue;
    ///
    /// assert_eq!(AmountValue::parse_units("1.5", 6).unwrap(), AmountValue(1_500_000));
    /// assert_eq!(AmountValue::parse_units("250", 6).unwrap(), AmountValue(250));
    /// assert!(AmountValue::parse_units("0.0000001", 6).is_err());
    /// ```
    pub fn parse_units(s: &str, decimals: u8) -> Result<Self, Error> {
        let s = s.trim();
        if s.contains('.') {
            Self::parse_decimal(s, decimals)
        } else {
            s.parse::<AmountValue>()
        }
    }

    /// Parse a human-readable token amount (e.g. `"1"` or `"0.05"`) and scale it by `decimals`.
    ///
    /// ```
    /// use x402_core::types::AmountValue;
    ///
    /// assert_eq!(AmountValue::parse_decimal("1", 6).unwrap(), AmountValue(1_000_000));
    /// assert_eq!(AmountValue::parse_decimal("0.05", 6).unwrap(), AmountValue(50_000));
    /// ```
    pub fn parse_decimal(s: &str, decimals: u8) -> Result<Self, Error> {
        let s = s.trim();
        let invalid = || Error::InvalidAmount(s.to_string());

        let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
        if fraction.len() > decimals as usize
            || !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit())
            || (whole.is_empty() && fraction.is_empty())
        {
            return Err(invalid());
        }

        let scale = 10u128.checked_pow(decimals as u32).ok_or_else(invalid)?;
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let padded = format!("{fraction:0<width$}", width = decimals as usize);
        let fraction: u128 = if padded.is_empty() {
            0
        } else {
            padded.parse().map_err(|_| invalid())?
        };

        whole
            .checked_mul(scale)
            .and_then(|w| w.checked_add(fraction))
            .map(AmountValue)
            .ok_or_else(invalid)
    }
}

impl FromStr for AmountValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u128>()
            .map(AmountValue)
            .map_err(|_| Error::InvalidAmount(s.to_string()))
    }
}

impl Display for AmountValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for AmountValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = AmountValue;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("an unsigned integer amount, as a string or a number")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(AmountValue::from(v))
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(AmountValue::from)
            .map_err(|_| E::custom(format!("negative amount {v}")))
    }
}

impl<'de> Deserialize<'de> for AmountValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(AmountVisitor)
    }
}
