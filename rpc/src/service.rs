//! Query façade over the shared store.
//!
//! Handlers go through [`QueryService`] rather than touching the store
//! directly, so address parsing and normalization happen in one place.

use std::sync::Arc;

use chainwatch_store::{CursorStore, LedgerStore, SubscriptionStore, WatchStore};
use chainwatch_types::{Address, BlockHeight, Transaction};

use crate::RpcError;

/// Result of a subscribe request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeOutcome {
    pub address: Address,
    /// `false` if the address was already subscribed.
    pub newly_subscribed: bool,
}

#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn WatchStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn WatchStore>) -> Self {
        Self { store }
    }

    /// Height of the last fully processed block; 0 before the first one.
    pub fn current_block(&self) -> Result<BlockHeight, RpcError> {
        Ok(self.store.current_block()?)
    }

    pub fn subscribe(&self, raw: &str) -> Result<SubscribeOutcome, RpcError> {
        let address = Address::parse(raw)?;
        let newly_subscribed = self.store.subscribe(&address)?;
        if newly_subscribed {
            tracing::info!(address = %address, "address subscribed");
        }
        Ok(SubscribeOutcome {
            address,
            newly_subscribed,
        })
    }

    /// Recorded history of an address, in no particular order. Unknown
    /// addresses yield an empty list.
    pub fn transactions(&self, raw: &str) -> Result<(Address, Vec<Transaction>), RpcError> {
        let address = Address::parse(raw)?;
        let txs = self.store.transactions_for(&address)?;
        Ok((address, txs))
    }

    pub fn subscription_count(&self) -> Result<u64, RpcError> {
        Ok(self.store.subscription_count()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainwatch_store::MemoryStore;

    fn service() -> (Arc<MemoryStore>, QueryService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), QueryService::new(store))
    }

    #[test]
    fn subscribe_reports_first_and_repeat() {
        let (_, svc) = service();
        assert!(svc.subscribe("0xABC").unwrap().newly_subscribed);
        let again = svc.subscribe("0xabc").unwrap();
        assert!(!again.newly_subscribed);
        assert_eq!(again.address.as_str(), "0xabc");
    }

    #[test]
    fn blank_address_is_rejected() {
        let (_, svc) = service();
        assert!(matches!(svc.subscribe(" "), Err(RpcError::InvalidRequest(_))));
        assert!(matches!(svc.transactions(""), Err(RpcError::InvalidRequest(_))));
    }

    #[test]
    fn history_lookup_normalizes_case() {
        let (store, svc) = service();
        let tx = Transaction {
            hash: "0x1".into(),
            from: "0xabc".into(),
            to: None,
            value: "0x0".into(),
        };
        store.save_transaction(&Address::new("0xabc"), &tx).unwrap();

        let (address, txs) = svc.transactions("0xABC").unwrap();
        assert_eq!(address.as_str(), "0xabc");
        assert_eq!(txs, vec![tx]);
    }

    #[test]
    fn current_block_reads_cursor() {
        let (store, svc) = service();
        assert_eq!(svc.current_block().unwrap(), 0);
        store.save_block(12).unwrap();
        assert_eq!(svc.current_block().unwrap(), 12);
    }
}
