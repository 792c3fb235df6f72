//! Live, shareable view of what the walker is doing.

use std::sync::{Arc, RwLock};

use serde::Serialize;

use chainwatch_types::BlockHeight;

/// Where the walker currently is in its loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkerState {
    #[default]
    SelectingStart,
    Fetching,
    RetryingFetch,
    WaitingNotMined,
    Processing,
    Stopped,
}

/// Snapshot served by `/status`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct WalkerStatus {
    pub state: WalkerState,
    /// Height the walker is working on, once chosen.
    pub target_height: Option<BlockHeight>,
    pub last_processed: Option<BlockHeight>,
    /// Failures in a row at the current step; reset on success.
    pub consecutive_retries: u32,
    pub total_fetch_errors: u64,
    pub persist_failures: u64,
    pub last_error: Option<String>,
}

/// Cloneable handle onto the walker's status.
///
/// A poisoned lock still yields the last written status: readers only ever
/// see whole snapshots.
#[derive(Clone, Debug, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<WalkerStatus>>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> WalkerStatus {
        match self.inner.read() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut WalkerStatus)) {
        match self.inner.write() {
            Ok(mut status) => f(&mut status),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let handle = StatusHandle::new();
        let reader = handle.clone();
        handle.update(|s| {
            s.state = WalkerState::Fetching;
            s.target_height = Some(7);
        });
        let snap = reader.snapshot();
        assert_eq!(snap.state, WalkerState::Fetching);
        assert_eq!(snap.target_height, Some(7));
    }

    #[test]
    fn serializes_state_in_snake_case() {
        let status = WalkerStatus {
            state: WalkerState::WaitingNotMined,
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "waiting_not_mined");
        assert!(json["last_error"].is_null());
    }
}
