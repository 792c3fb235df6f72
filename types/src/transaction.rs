//! Ledger transaction as seen by the walker.

use serde::{Deserialize, Serialize};

use crate::Address;

/// A transaction extracted from a block.
///
/// All fields are opaque strings from the ledger source; the only field with
/// meaning to chainwatch is `hash`, the dedup identity within an address's
/// history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    /// Recipient. `None` for contract creation.
    #[serde(default)]
    pub to: Option<String>,
    pub value: String,
}

impl Transaction {
    /// Normalized sender address.
    pub fn sender(&self) -> Address {
        Address::new(&self.from)
    }

    /// Normalized recipient address, if any.
    pub fn recipient(&self) -> Option<Address> {
        self.to
            .as_deref()
            .filter(|to| !to.trim().is_empty())
            .map(Address::new)
    }
}
