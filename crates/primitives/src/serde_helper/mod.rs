//! Various serde utilities

use std::num::ParseIntError;

/// serde functions for handling primitive `u64` as [U64](crate::U64)
pub mod u64_hex {
    use crate::U64;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Deserializes an `u64` from [U64] accepting a hex quantity string with optional 0x prefix
    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        U64::deserialize(deserializer).map(|val| val.to::<u64>())
    }

    /// Serializes u64 as hex string
    pub fn serialize<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
        U64::from(*value).serialize(s)
    }
}

/// serde functions for a `u64` that may arrive as a JSON number, a `0x` hex quantity or a
/// decimal string. Always serialized as a hex quantity.
pub mod u64_hex_or_decimal {
    use super::parse_u64_quantity;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    /// Deserializes the quantity in any of the accepted notations.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(num) => Ok(num),
            NumberOrString::String(s) => parse_u64_quantity(&s).map_err(D::Error::custom),
        }
    }

    /// Serializes u64 as hex string
    pub fn serialize<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
        super::u64_hex::serialize(value, s)
    }
}

/// Parses a quantity string: `0x`-prefixed hex, or plain decimal.
pub fn parse_u64_quantity(s: &str) -> Result<u64, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    }
}
