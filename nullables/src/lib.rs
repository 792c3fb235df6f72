//! Nullable infrastructure for deterministic testing.
//!
//! The walker's collaborators (ledger source, store) are abstracted behind
//! traits. This crate provides test-friendly implementations that:
//! - Return scripted values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod source;
pub mod store;

pub use source::{NullLedgerSource, ScriptedFetch};
pub use store::FaultyStore;
