//! Bluetooth hardware addresses.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

use crate::error::ProximaError;

static MAC_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$").expect("address pattern is valid")
});

/// Returns `true` if `value` is a 17-character colon-separated hex address.
#[must_use]
pub fn is_valid_mac_address(value: &str) -> bool {
    MAC_ADDRESS_RE.is_match(value)
}

/// A validated, upper-cased hardware address such as `AA:BB:CC:DD:EE:01`.
///
/// Addresses compare case-insensitively because they are normalized on
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, ToSchema)]
#[schema(value_type = String, example = "AA:BB:CC:DD:EE:01")]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Parse and normalize an address.
    ///
    /// # Errors
    ///
    /// Returns [`ProximaError::InvalidAddress`] when `value` is not exactly
    /// 17 characters of colon-separated hex. Surrounding whitespace is not
    /// stripped.
    pub fn parse(value: &str) -> Result<Self, ProximaError> {
        if is_valid_mac_address(value) {
            Ok(Self(value.to_ascii_uppercase()))
        } else {
            Err(ProximaError::InvalidAddress(value.to_string()))
        }
    }

    /// The normalized address text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceAddress {
    type Err = ProximaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for DeviceAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for DeviceAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DeviceAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
