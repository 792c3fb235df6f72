//! LMDB implementation of LedgerStore.
//!
//! Key format: `address_len (u16 BE) ++ address_bytes ++ tx_hash_bytes`. The
//! length prefix pins where the address ends, so a prefix scan yields exactly
//! one address's transactions whatever bytes the address or hash carry, and
//! an empty hash is still a well-formed key. Values are bincode-encoded
//! [`Transaction`]s.

use chainwatch_store::{LedgerStore, StoreError};
use chainwatch_types::{Address, Transaction};

use crate::{LmdbError, LmdbStore};

const LEN_PREFIX: usize = 2;

/// `address_len ++ address`, or `None` if the address cannot be encoded.
fn address_prefix(address: &Address) -> Option<Vec<u8>> {
    let addr = address.as_bytes();
    let len = u16::try_from(addr.len()).ok()?;
    let mut prefix = Vec::with_capacity(LEN_PREFIX + addr.len());
    prefix.extend_from_slice(&len.to_be_bytes());
    prefix.extend_from_slice(addr);
    Some(prefix)
}

/// Build the composite key `address_len ++ address ++ hash`.
fn ledger_key(address: &Address, hash: &str) -> Option<Vec<u8>> {
    let mut key = address_prefix(address)?;
    key.extend_from_slice(hash.as_bytes());
    Some(key)
}

/// Split a ledger key into `(address, hash)`. `None` if the key is too short
/// for its own length prefix or names an empty address.
pub(crate) fn split_ledger_key(key: &[u8]) -> Option<(&[u8], &[u8])> {
    let (len, rest) = key.split_first_chunk::<LEN_PREFIX>()?;
    let len = u16::from_be_bytes(*len) as usize;
    if len == 0 || rest.len() < len {
        return None;
    }
    Some(rest.split_at(len))
}

impl LedgerStore for LmdbStore {
    fn save_transaction(&self, address: &Address, tx: &Transaction) -> Result<(), StoreError> {
        let key = ledger_key(address, &tx.hash).ok_or_else(|| {
            StoreError::Backend(format!(
                "address of {} bytes does not fit a ledger key",
                address.as_bytes().len()
            ))
        })?;
        let bytes = bincode::serialize(tx).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.transactions_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn transactions_for(&self, address: &Address) -> Result<Vec<Transaction>, StoreError> {
        let Some(prefix) = address_prefix(address) else {
            return Ok(Vec::new());
        };
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self
            .transactions_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for entry in iter {
            let (_key, val) = entry.map_err(LmdbError::from)?;
            let tx: Transaction = bincode::deserialize(val).map_err(LmdbError::from)?;
            results.push(tx);
        }
        Ok(results)
    }

    fn transaction_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let count = self.transactions_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_of_prefix_addresses_do_not_collide() {
        // "0xab" must not scan into "0xabc"'s entries.
        let short = address_prefix(&Address::new("0xab")).unwrap();
        let long_key = ledger_key(&Address::new("0xabc"), "0x01").unwrap();
        assert!(!long_key.starts_with(&short));
    }

    #[test]
    fn nul_in_address_does_not_alias_a_shorter_address() {
        let short = address_prefix(&Address::new("0xa")).unwrap();
        let key = ledger_key(&Address::new("0xa\0evil"), "0x01").unwrap();
        assert!(!key.starts_with(&short));
    }

    #[test]
    fn key_embeds_normalized_address() {
        let key = ledger_key(&Address::new("0xAB"), "0xff").unwrap();
        assert_eq!(key, b"\x00\x040xab0xff".to_vec());
        assert_eq!(
            split_ledger_key(&key),
            Some((&b"0xab"[..], &b"0xff"[..]))
        );
    }

    #[test]
    fn empty_hash_still_splits() {
        let key = ledger_key(&Address::new("0xa"), "").unwrap();
        assert_eq!(split_ledger_key(&key), Some((&b"0xa"[..], &b""[..])));
    }

    #[test]
    fn truncated_keys_do_not_split() {
        assert_eq!(split_ledger_key(b""), None);
        assert_eq!(split_ledger_key(b"\x00"), None);
        assert_eq!(split_ledger_key(b"\x00\x00hash"), None);
        assert_eq!(split_ledger_key(b"\x00\x090xa"), None);
    }

    #[test]
    fn oversized_address_has_no_key() {
        let huge = Address::new("a".repeat(u16::MAX as usize + 1));
        assert!(ledger_key(&huge, "0x1").is_none());
    }
}
