//! Block as delivered by a ledger source.

use serde::{Deserialize, Serialize};

use crate::Transaction;

/// Height of a block in the ledger.
pub type BlockHeight = u64;

/// An ordered list of transactions at a given height.
///
/// A block whose `number` is `None` has not been produced yet: the requested
/// height is beyond the chain head. That is a normal, retryable condition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub number: Option<BlockHeight>,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// A block at `number` carrying `transactions`.
    pub fn new(number: BlockHeight, transactions: Vec<Transaction>) -> Self {
        Self {
            number: Some(number),
            transactions,
        }
    }

    /// The marker returned for a height that has not been produced yet.
    pub fn not_yet_produced() -> Self {
        Self::default()
    }

    pub fn is_produced(&self) -> bool {
        self.number.is_some()
    }
}
