//! Fault-injecting store: an in-memory store whose writes can be made to fail.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chainwatch_store::{CursorStore, LedgerStore, MemoryStore, StoreError, SubscriptionStore};
use chainwatch_types::{Address, BlockHeight, Transaction};

/// Wraps a [`MemoryStore`] and fails selected operations on demand.
///
/// Failures are counted down: each armed failure fires once, after which the
/// operation goes through to the inner store.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    failing_hashes: Mutex<HashMap<String, u32>>,
    save_block_failures: Mutex<u32>,
    snapshot_failures: Mutex<u32>,
    saved_blocks: Mutex<Vec<BlockHeight>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` saves of a transaction with this hash.
    pub fn fail_transaction(&self, hash: &str, times: u32) {
        self.failing_hashes
            .lock()
            .unwrap()
            .insert(hash.to_string(), times);
    }

    /// Fail the next `times` cursor writes.
    pub fn fail_save_block(&self, times: u32) {
        *self.save_block_failures.lock().unwrap() = times;
    }

    /// Fail the next `times` subscription snapshots.
    pub fn fail_snapshot(&self, times: u32) {
        *self.snapshot_failures.lock().unwrap() = times;
    }

    /// Every height successfully written via `save_block`, in order.
    pub fn saved_blocks(&self) -> Vec<BlockHeight> {
        self.saved_blocks.lock().unwrap().clone()
    }

    fn take(counter: &Mutex<u32>) -> bool {
        let mut left = counter.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            true
        } else {
            false
        }
    }
}

impl CursorStore for FaultyStore {
    fn current_block(&self) -> Result<BlockHeight, StoreError> {
        self.inner.current_block()
    }

    fn save_block(&self, height: BlockHeight) -> Result<(), StoreError> {
        if Self::take(&self.save_block_failures) {
            return Err(StoreError::Backend(format!("injected cursor failure at {height}")));
        }
        self.inner.save_block(height)?;
        self.saved_blocks.lock().unwrap().push(height);
        Ok(())
    }
}

impl SubscriptionStore for FaultyStore {
    fn subscribe(&self, address: &Address) -> Result<bool, StoreError> {
        self.inner.subscribe(address)
    }

    fn all_subscriptions(&self) -> Result<HashSet<Address>, StoreError> {
        if Self::take(&self.snapshot_failures) {
            return Err(StoreError::Backend("injected snapshot failure".into()));
        }
        self.inner.all_subscriptions()
    }
}

impl LedgerStore for FaultyStore {
    fn save_transaction(&self, address: &Address, tx: &Transaction) -> Result<(), StoreError> {
        {
            let mut failing = self.failing_hashes.lock().unwrap();
            if let Some(left) = failing.get_mut(&tx.hash) {
                if *left > 0 {
                    *left -= 1;
                    return Err(StoreError::Backend(format!(
                        "injected write failure for {}",
                        tx.hash
                    )));
                }
            }
        }
        self.inner.save_transaction(address, tx)
    }

    fn transactions_for(&self, address: &Address) -> Result<Vec<Transaction>, StoreError> {
        self.inner.transactions_for(address)
    }

    fn transaction_count(&self) -> Result<u64, StoreError> {
        self.inner.transaction_count()
    }
}
