//! Per-address transaction ledger trait.

use crate::StoreError;
use chainwatch_types::{Address, Transaction};

/// Matched transactions, keyed by `(address, tx.hash)`.
///
/// Each pair holds at most one transaction, so re-processing a block after a
/// crash overwrites instead of duplicating.
pub trait LedgerStore {
    /// Insert or overwrite `tx` under `(address, tx.hash)`.
    fn save_transaction(&self, address: &Address, tx: &Transaction) -> Result<(), StoreError>;

    /// Every transaction stored for `address`; empty if none.
    fn transactions_for(&self, address: &Address) -> Result<Vec<Transaction>, StoreError>;

    /// Total number of `(address, hash)` entries.
    fn transaction_count(&self) -> Result<u64, StoreError>;
}
