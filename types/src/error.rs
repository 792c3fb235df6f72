//! Top-level error type shared across crates.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("address must not be empty")]
    EmptyAddress,
}
