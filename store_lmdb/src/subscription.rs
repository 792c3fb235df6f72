//! LMDB implementation of SubscriptionStore.
//!
//! Keys are normalized address bytes; values are empty.

use std::collections::HashSet;

use chainwatch_store::{StoreError, SubscriptionStore};
use chainwatch_types::Address;

use crate::{LmdbError, LmdbStore};

impl SubscriptionStore for LmdbStore {
    fn subscribe(&self, address: &Address) -> Result<bool, StoreError> {
        // Check and insert under one write transaction so two concurrent
        // subscribers cannot both observe "new".
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let exists = self
            .subscriptions_db
            .get(&wtxn, address.as_bytes())
            .map_err(LmdbError::from)?
            .is_some();
        if exists {
            return Ok(false);
        }
        self.subscriptions_db
            .put(&mut wtxn, address.as_bytes(), &[])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn all_subscriptions(&self) -> Result<HashSet<Address>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.subscriptions_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut subs = HashSet::new();
        for entry in iter {
            let (key, _) = entry.map_err(LmdbError::from)?;
            let addr = std::str::from_utf8(key)
                .map_err(|e| LmdbError::Serialization(e.to_string()))?;
            subs.insert(Address::new(addr));
        }
        Ok(subs)
    }

    fn is_subscribed(&self, address: &Address) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let found = self
            .subscriptions_db
            .get(&rtxn, address.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(found.is_some())
    }

    fn subscription_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let count = self.subscriptions_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}
