//! LMDB storage backend for chainwatch.
//!
//! Implements the `chainwatch-store` traits using the `heed` LMDB bindings, so
//! subscriptions, matched transactions and the progress cursor survive a
//! restart. Each logical structure maps to one named database within a single
//! environment.

pub mod cursor;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod ledger;
pub mod meta;
pub mod migration;
pub mod subscription;

pub use environment::LmdbStore;
pub use error::LmdbError;
