//! In-memory backend: state lives for the process lifetime.
//!
//! Each structure has its own synchronization domain: the cursor is an
//! atomic, and the subscription set and ledger sit behind separate
//! `RwLock`s. A façade read of the ledger never waits on a walker cursor
//! write, and concurrent readers never block each other.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chainwatch_types::{Address, BlockHeight, Transaction};

use crate::{CursorStore, LedgerStore, StoreError, SubscriptionStore};

type Ledger = HashMap<Address, HashMap<String, Transaction>>;

/// Thread-safe in-memory store. Created empty; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    cursor: AtomicU64,
    subscriptions: RwLock<HashSet<Address>>,
    ledger: RwLock<Ledger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for MemoryStore {
    fn current_block(&self) -> Result<BlockHeight, StoreError> {
        Ok(self.cursor.load(Ordering::Acquire))
    }

    fn save_block(&self, height: BlockHeight) -> Result<(), StoreError> {
        self.cursor.store(height, Ordering::Release);
        Ok(())
    }
}

impl SubscriptionStore for MemoryStore {
    fn subscribe(&self, address: &Address) -> Result<bool, StoreError> {
        let mut subs = self
            .subscriptions
            .write()
            .map_err(|_| StoreError::Poisoned("subscriptions"))?;
        Ok(subs.insert(address.clone()))
    }

    fn all_subscriptions(&self) -> Result<HashSet<Address>, StoreError> {
        let subs = self
            .subscriptions
            .read()
            .map_err(|_| StoreError::Poisoned("subscriptions"))?;
        Ok(subs.clone())
    }

    fn is_subscribed(&self, address: &Address) -> Result<bool, StoreError> {
        let subs = self
            .subscriptions
            .read()
            .map_err(|_| StoreError::Poisoned("subscriptions"))?;
        Ok(subs.contains(address))
    }

    fn subscription_count(&self) -> Result<u64, StoreError> {
        let subs = self
            .subscriptions
            .read()
            .map_err(|_| StoreError::Poisoned("subscriptions"))?;
        Ok(subs.len() as u64)
    }
}

impl LedgerStore for MemoryStore {
    fn save_transaction(&self, address: &Address, tx: &Transaction) -> Result<(), StoreError> {
        let mut ledger = self
            .ledger
            .write()
            .map_err(|_| StoreError::Poisoned("ledger"))?;
        ledger
            .entry(address.clone())
            .or_default()
            .insert(tx.hash.clone(), tx.clone());
        Ok(())
    }

    fn transactions_for(&self, address: &Address) -> Result<Vec<Transaction>, StoreError> {
        let ledger = self
            .ledger
            .read()
            .map_err(|_| StoreError::Poisoned("ledger"))?;
        Ok(ledger
            .get(address)
            .map(|txs| txs.values().cloned().collect())
            .unwrap_or_default())
    }

    fn transaction_count(&self) -> Result<u64, StoreError> {
        let ledger = self
            .ledger
            .read()
            .map_err(|_| StoreError::Poisoned("ledger"))?;
        Ok(ledger.values().map(|txs| txs.len() as u64).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tx(hash: &str, from: &str, to: &str, value: &str) -> Transaction {
        Transaction {
            hash: hash.into(),
            from: from.into(),
            to: Some(to.into()),
            value: value.into(),
        }
    }

    #[test]
    fn fresh_store_reports_sentinel_cursor() {
        let store = MemoryStore::new();
        assert_eq!(store.current_block().unwrap(), 0);
        store.save_block(42).unwrap();
        assert_eq!(store.current_block().unwrap(), 42);
    }

    #[test]
    fn save_block_overwrites_without_monotonicity_check() {
        let store = MemoryStore::new();
        store.save_block(10).unwrap();
        store.save_block(3).unwrap();
        assert_eq!(store.current_block().unwrap(), 3);
    }

    #[test]
    fn subscribe_is_idempotent() {
        let store = MemoryStore::new();
        let addr = Address::new("0xabc");
        assert!(store.subscribe(&addr).unwrap());
        assert!(!store.subscribe(&addr).unwrap());
        assert_eq!(store.all_subscriptions().unwrap().len(), 1);
        assert_eq!(store.subscription_count().unwrap(), 1);
    }

    #[test]
    fn subscribe_normalizes_case() {
        let store = MemoryStore::new();
        assert!(store.subscribe(&Address::new("0xABCDEF")).unwrap());
        assert!(!store.subscribe(&Address::new("0xabcdef")).unwrap());
        assert!(store.is_subscribed(&Address::new("0xAbCdEf")).unwrap());
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let store = MemoryStore::new();
        store.subscribe(&Address::new("0x1")).unwrap();
        let snapshot = store.all_subscriptions().unwrap();
        store.subscribe(&Address::new("0x2")).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.subscription_count().unwrap(), 2);
    }

    #[test]
    fn saving_same_hash_twice_keeps_latest_single_entry() {
        let store = MemoryStore::new();
        let addr = Address::new("0xa");
        store.save_transaction(&addr, &tx("0xh", "0xa", "0xb", "0x1")).unwrap();
        store.save_transaction(&addr, &tx("0xh", "0xa", "0xb", "0x2")).unwrap();

        let txs = store.transactions_for(&addr).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].value, "0x2");
        assert_eq!(store.transaction_count().unwrap(), 1);
    }

    #[test]
    fn same_hash_under_two_addresses_is_two_entries() {
        let store = MemoryStore::new();
        let t = tx("0xh", "0xa", "0xb", "0x1");
        store.save_transaction(&Address::new("0xa"), &t).unwrap();
        store.save_transaction(&Address::new("0xb"), &t).unwrap();
        assert_eq!(store.transaction_count().unwrap(), 2);
    }

    #[test]
    fn unknown_address_yields_empty_history() {
        let store = MemoryStore::new();
        assert!(store
            .transactions_for(&Address::new("0xnobody"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn ledger_lookup_is_case_insensitive() {
        let store = MemoryStore::new();
        store
            .save_transaction(&Address::new("0xABC"), &tx("0xh", "0xabc", "0xd", "0x1"))
            .unwrap();
        assert_eq!(store.transactions_for(&Address::new("0xabc")).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_subscribes_lose_no_updates() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store
                            .subscribe(&Address::new(format!("0x{t:02x}{i:04x}")))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.subscription_count().unwrap(), 800);
    }

    proptest::proptest! {
        /// Any sequence of saves leaves exactly one entry per distinct hash.
        #[test]
        fn ledger_holds_one_entry_per_hash(hashes in proptest::collection::vec(0u8..16, 0..64)) {
            let store = MemoryStore::new();
            let addr = Address::new("0xa");
            for h in &hashes {
                store.save_transaction(&addr, &tx(&format!("0x{h:x}"), "0xa", "0xb", "0x0")).unwrap();
            }
            let distinct: HashSet<_> = hashes.iter().collect();
            proptest::prop_assert_eq!(store.transactions_for(&addr).unwrap().len(), distinct.len());
        }
    }
}
