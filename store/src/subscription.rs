//! Subscription set storage trait.

use std::collections::HashSet;

use crate::StoreError;
use chainwatch_types::Address;

/// The set of addresses being tracked.
pub trait SubscriptionStore {
    /// Add an address. Returns `true` iff this call inserted it.
    fn subscribe(&self, address: &Address) -> Result<bool, StoreError>;

    /// Point-in-time snapshot of every subscribed address.
    fn all_subscriptions(&self) -> Result<HashSet<Address>, StoreError>;

    fn is_subscribed(&self, address: &Address) -> Result<bool, StoreError> {
        self.all_subscriptions().map(|subs| subs.contains(address))
    }

    fn subscription_count(&self) -> Result<u64, StoreError> {
        self.all_subscriptions().map(|subs| subs.len() as u64)
    }
}
