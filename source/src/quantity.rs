//! Hex quantity encoding used by Ethereum JSON-RPC (`"0x1b4"`).

use crate::SourceError;

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(s: &str) -> Result<u64, SourceError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| SourceError::Decode(format!("quantity {s:?} lacks 0x prefix")))?;
    if digits.is_empty() {
        return Err(SourceError::Decode("empty quantity".into()));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| SourceError::Decode(format!("quantity {s:?}: {e}")))
}

/// Encode a height as a hex quantity.
pub fn encode_quantity(n: u64) -> String {
    format!("0x{n:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_hex() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert_eq!(parse_quantity("0X10").unwrap(), 16);
    }

    #[test]
    fn rejects_malformed() {
        assert!(parse_quantity("1b4").is_err());
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn encodes_without_leading_zeros() {
        assert_eq!(encode_quantity(0), "0x0");
        assert_eq!(encode_quantity(20_000_000), "0x1312d00");
    }
}
