//! Storage traits for chainwatch.
//!
//! The walker and the query façade depend only on these traits. Each backend
//! (in-memory here, LMDB in `chainwatch-store-lmdb`) implements all three
//! concerns and thereby the umbrella [`WatchStore`] trait.

pub mod cursor;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod subscription;

pub use cursor::CursorStore;
pub use error::StoreError;
pub use ledger::LedgerStore;
pub use memory::MemoryStore;
pub use subscription::SubscriptionStore;

/// Everything the walker and the façade need from a single shared store.
pub trait WatchStore: CursorStore + SubscriptionStore + LedgerStore + Send + Sync {}

impl<T> WatchStore for T where T: CursorStore + SubscriptionStore + LedgerStore + Send + Sync {}
