//! Fundamental types for chainwatch.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! case-normalized addresses, ledger transactions, and blocks as delivered by a
//! ledger source.

pub mod address;
pub mod block;
pub mod error;
pub mod transaction;

pub use address::Address;
pub use block::{Block, BlockHeight};
pub use error::TypesError;
pub use transaction::Transaction;
