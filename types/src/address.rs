//! Case-insensitive ledger address.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// A ledger address, normalized to lowercase on construction.
///
/// Ledger addresses are hex strings whose case carries no meaning for identity
/// (mixed case is only a checksum encoding). Every store operation keys on the
/// normalized form, so `0xABC…` and `0xabc…` always refer to the same entry.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Address(String);

impl Address {
    /// Create a normalized address from a raw string.
    ///
    /// No syntax validation is performed; see [`Address::parse`] for the
    /// checked variant used at API boundaries.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    /// Parse caller-supplied input, rejecting empty strings.
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let address = Self::new(raw);
        if address.0.is_empty() {
            return Err(TypesError::EmptyAddress);
        }
        Ok(address)
    }

    /// Return the normalized address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_case_normalizes_to_lowercase() {
        let addr = Address::new("0xE52470BEF1DA70AF094A91E326076C0BDCA688FF");
        assert_eq!(addr.as_str(), "0xe52470bef1da70af094a91e326076c0bdca688ff");
        assert_eq!(addr, Address::new("0xe52470bef1da70af094a91e326076c0bdca688ff"));
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(Address::new("  0xAb \n").as_str(), "0xab");
    }

    #[test]
    fn parse_rejects_empty_and_blank() {
        assert_eq!(Address::parse(""), Err(TypesError::EmptyAddress));
        assert_eq!(Address::parse("   "), Err(TypesError::EmptyAddress));
        assert!(Address::parse("0x01").is_ok());
    }

    #[test]
    fn deserialization_normalizes() {
        let addr: Address = serde_json::from_str("\"0xDEADbeef\"").unwrap();
        assert_eq!(addr.as_str(), "0xdeadbeef");
        assert_eq!(serde_json::to_string(&addr).unwrap(), "\"0xdeadbeef\"");
    }
}
