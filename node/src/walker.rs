//! Chain walker: visits ledger blocks in strictly ascending height order and
//! records every transaction that touches a subscribed address.
//!
//! One walker runs per store. Each block is handled as a single pass:
//! classify against a subscription snapshot, persist matches, then advance
//! the progress cursor. Failures never advance the cursor (except skipped
//! transaction writes under [`PersistFailurePolicy::Skip`]); the same height
//! is retried after a backoff delay. Shutdown is observed between passes and
//! during every wait or fetch, never in the middle of a pass.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chainwatch_source::{LedgerSource, SourceError};
use chainwatch_store::{CursorStore, LedgerStore, SubscriptionStore, WatchStore};
use chainwatch_types::{Address, Block, BlockHeight, Transaction};

use crate::config::{PersistFailurePolicy, WatcherConfig};
use crate::metrics::WatcherMetrics;
use crate::retry::RetryPolicy;
use crate::shutdown::ShutdownSignal;
use crate::status::{StatusHandle, WalkerState};
use crate::tracing_spans::walk_block_span;

/// Runtime knobs for a [`ChainWalker`].
#[derive(Clone, Debug)]
pub struct WalkerConfig {
    /// Start at the ledger head instead of after the saved cursor.
    pub live: bool,
    /// Wait before re-asking for a block that is not produced yet.
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    pub persist_failure_policy: PersistFailurePolicy,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self::from(&WatcherConfig::default())
    }
}

impl From<&WatcherConfig> for WalkerConfig {
    fn from(config: &WatcherConfig) -> Self {
        Self {
            live: config.live,
            poll_interval: config.poll_interval(),
            retry: RetryPolicy::from(&config.retry),
            persist_failure_policy: config.persist_failure_policy,
        }
    }
}

/// Result of handling one fetched block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Block committed; the cursor now points at it.
    Advanced {
        /// Ledger entries written (a self-transfer counts twice).
        matched: usize,
        /// Matched entries dropped after a write failure.
        skipped: usize,
    },
    /// The ledger has not produced this height yet.
    NotProduced,
    /// Nothing committed; try the same height again after a delay.
    Retry(String),
}

/// Reported when the walker stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalkerExit {
    /// Last height whose pass completed and was saved to the cursor during
    /// this run. `None` if no block was committed.
    pub last_processed: Option<BlockHeight>,
}

pub struct ChainWalker {
    store: Arc<dyn WatchStore>,
    source: Arc<dyn LedgerSource>,
    config: WalkerConfig,
    status: StatusHandle,
    metrics: Arc<WatcherMetrics>,
    shutdown: ShutdownSignal,
}

impl ChainWalker {
    pub fn new(
        store: Arc<dyn WatchStore>,
        source: Arc<dyn LedgerSource>,
        config: WalkerConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            store,
            source,
            config,
            status: StatusHandle::new(),
            metrics: Arc::new(WatcherMetrics::new()),
            shutdown,
        }
    }

    /// Report into an existing metrics registry.
    pub fn with_metrics(mut self, metrics: Arc<WatcherMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Publish progress through an existing status handle.
    pub fn with_status(mut self, status: StatusHandle) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn metrics(&self) -> Arc<WatcherMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Walk until shutdown is requested.
    pub async fn run(mut self) -> WalkerExit {
        let mut last_processed = None;

        if let Some(start) = self.select_start().await {
            let mut height = start;
            let mut backoff = self.config.retry.backoff();

            while !self.shutdown.is_triggered() {
                self.status.update(|s| {
                    s.state = WalkerState::Fetching;
                    s.target_height = Some(height);
                });

                let fetched = tokio::select! {
                    biased;
                    _ = self.shutdown.wait() => break,
                    fetched = self.source.block_at(height) => fetched,
                };

                match self.process(height, fetched) {
                    StepOutcome::Advanced { .. } => {
                        last_processed = Some(height);
                        backoff.reset();
                        height = height.saturating_add(1);
                    }
                    StepOutcome::NotProduced => {
                        backoff.reset();
                        self.status.update(|s| {
                            s.state = WalkerState::WaitingNotMined;
                            s.consecutive_retries = 0;
                        });
                        if !self.pause(self.config.poll_interval).await {
                            break;
                        }
                    }
                    StepOutcome::Retry(reason) => {
                        let delay = backoff.next_delay();
                        let attempt = backoff.attempts();
                        tracing::warn!(
                            height,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %reason,
                            "block pass failed, retrying same height"
                        );
                        self.status.update(|s| {
                            s.state = WalkerState::RetryingFetch;
                            s.consecutive_retries = attempt;
                        });
                        if !self.pause(delay).await {
                            break;
                        }
                    }
                }
            }
        }

        self.status.update(|s| s.state = WalkerState::Stopped);
        tracing::info!(?last_processed, "chain walker stopped");
        WalkerExit { last_processed }
    }

    /// Fetch and handle a single height without waiting or retrying.
    pub async fn step(&self, height: BlockHeight) -> StepOutcome {
        let fetched = self.source.block_at(height).await;
        self.process(height, fetched)
    }

    /// Handle the answer for `height`: classify, persist, advance.
    ///
    /// Runs to completion once started; the cursor is only written after
    /// every matched transaction has been attempted.
    pub fn process(&self, height: BlockHeight, fetched: Result<Block, SourceError>) -> StepOutcome {
        let block = match fetched {
            Ok(block) => block,
            Err(e) => return self.failed(format!("fetching block {height}: {e}")),
        };

        match block.number {
            None => {
                tracing::debug!(height, "block not produced yet, waiting");
                self.metrics.not_mined_waits.inc();
                return StepOutcome::NotProduced;
            }
            Some(number) if number != height => {
                return self.failed(format!(
                    "asked for block {height}, ledger answered with {number}"
                ));
            }
            Some(_) => {}
        }

        let subscriptions = match self.store.all_subscriptions() {
            Ok(subs) => subs,
            Err(e) => return self.failed(format!("reading subscriptions: {e}")),
        };
        self.metrics.subscriptions.set(subscriptions.len() as i64);

        let span = walk_block_span(height);
        let _guard = span.enter();
        let started = Instant::now();
        self.status.update(|s| s.state = WalkerState::Processing);

        let mut matched = 0;
        let mut failed = 0;
        for tx in &block.transactions {
            for owner in owners(tx, &subscriptions) {
                if self.persist(height, &owner, tx) {
                    matched += 1;
                } else {
                    failed += 1;
                }
            }
        }

        if failed > 0 && self.config.persist_failure_policy == PersistFailurePolicy::RetryBlock {
            return StepOutcome::Retry(format!(
                "{failed} transaction write(s) failed in block {height}"
            ));
        }

        if let Err(e) = self.store.save_block(height) {
            return self.failed(format!("saving cursor at {height}: {e}"));
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        self.metrics.blocks_processed.inc();
        self.metrics.cursor_height.set(height as i64);
        self.metrics.block_process_time_ms.observe(elapsed_ms);
        self.status.update(|s| {
            s.last_processed = Some(height);
            s.consecutive_retries = 0;
        });
        tracing::debug!(
            height,
            transactions = block.transactions.len(),
            matched,
            skipped = failed,
            "processed block"
        );

        StepOutcome::Advanced {
            matched,
            skipped: failed,
        }
    }

    /// Choose the first height to visit. `None` if shutdown came first.
    async fn select_start(&mut self) -> Option<BlockHeight> {
        let mut backoff = self.config.retry.backoff();
        self.status.update(|s| s.state = WalkerState::SelectingStart);

        loop {
            if self.shutdown.is_triggered() {
                return None;
            }

            let selected = if self.config.live {
                tokio::select! {
                    biased;
                    _ = self.shutdown.wait() => return None,
                    head = self.source.current_height() => {
                        head.map_err(|e| format!("reading ledger head: {e}"))
                    }
                }
            } else {
                self.store
                    .current_block()
                    .map(|cursor| cursor.saturating_add(1))
                    .map_err(|e| format!("reading progress cursor: {e}"))
            };

            match selected {
                Ok(height) => {
                    tracing::info!(height, live = self.config.live, "selected start height");
                    return Some(height);
                }
                Err(reason) => {
                    self.record_failure(&reason);
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        attempt = backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %reason,
                        "could not select start height, retrying"
                    );
                    if !self.pause(delay).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Write one ledger entry. Failures are logged and counted here.
    fn persist(&self, height: BlockHeight, owner: &Address, tx: &Transaction) -> bool {
        match self.store.save_transaction(owner, tx) {
            Ok(()) => {
                self.metrics.transactions_matched.inc();
                true
            }
            Err(e) => {
                tracing::error!(
                    height,
                    address = %owner,
                    hash = %tx.hash,
                    error = %e,
                    "failed to persist matched transaction"
                );
                self.metrics.persist_failures.inc();
                self.status.update(|s| {
                    s.persist_failures += 1;
                    s.last_error = Some(format!("persisting {} for {owner}: {e}", tx.hash));
                });
                false
            }
        }
    }

    fn failed(&self, reason: String) -> StepOutcome {
        self.record_failure(&reason);
        StepOutcome::Retry(reason)
    }

    /// Count a fetch-side failure in metrics and status.
    fn record_failure(&self, reason: &str) {
        self.metrics.fetch_errors.inc();
        self.status.update(|s| {
            s.total_fetch_errors += 1;
            s.last_error = Some(reason.to_string());
        });
    }

    /// Sleep for `delay` unless shutdown arrives first. Returns `false` on
    /// shutdown.
    async fn pause(&mut self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.wait() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

/// Addresses a transaction must be recorded under: the recipient, then the
/// sender, each only if subscribed. Both checks are independent, so a
/// self-transfer yields the same address twice.
fn owners(tx: &Transaction, subscriptions: &HashSet<Address>) -> Vec<Address> {
    tx.recipient()
        .into_iter()
        .chain(std::iter::once(tx.sender()))
        .filter(|addr| subscriptions.contains(addr))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainwatch_nullables::{FaultyStore, NullLedgerSource};
    use chainwatch_store::MemoryStore;

    use crate::shutdown::ShutdownController;

    fn tx(hash: &str, from: &str, to: Option<&str>) -> Transaction {
        Transaction {
            hash: hash.into(),
            from: from.into(),
            to: to.map(Into::into),
            value: "0x1".into(),
        }
    }

    fn walker(store: Arc<dyn WatchStore>, policy: PersistFailurePolicy) -> ChainWalker {
        let config = WalkerConfig {
            live: false,
            poll_interval: Duration::from_secs(5),
            retry: RetryPolicy::immediate(),
            persist_failure_policy: policy,
        };
        ChainWalker::new(
            store,
            Arc::new(NullLedgerSource::new()),
            config,
            ShutdownController::new().subscribe(),
        )
    }

    #[test]
    fn owners_checks_recipient_and_sender_independently() {
        let subs: HashSet<Address> = [Address::new("0xa")].into_iter().collect();
        assert_eq!(owners(&tx("h", "0xA", Some("0xb")), &subs), vec![Address::new("0xa")]);
        assert_eq!(owners(&tx("h", "0xb", Some("0xA")), &subs), vec![Address::new("0xa")]);
        assert_eq!(owners(&tx("h", "0xa", Some("0xa")), &subs).len(), 2);
        assert!(owners(&tx("h", "0xb", None), &subs).is_empty());
    }

    #[test]
    fn matched_transactions_land_in_each_subscribed_bucket() {
        let store = Arc::new(MemoryStore::new());
        store.subscribe(&Address::new("0xa")).unwrap();
        store.subscribe(&Address::new("0xb")).unwrap();
        let w = walker(store.clone(), PersistFailurePolicy::Skip);

        let block = Block::new(
            9,
            vec![
                tx("0x1", "0xA", Some("0xB")),
                tx("0x2", "0xc", Some("0xd")),
                tx("0x3", "0xa", Some("0xa")),
            ],
        );
        let outcome = w.process(9, Ok(block));

        assert_eq!(outcome, StepOutcome::Advanced { matched: 4, skipped: 0 });
        assert_eq!(store.transactions_for(&Address::new("0xa")).unwrap().len(), 2);
        assert_eq!(store.transactions_for(&Address::new("0xb")).unwrap().len(), 1);
        assert_eq!(store.current_block().unwrap(), 9);
        assert_eq!(w.metrics().transactions_matched.get(), 4);
    }

    #[test]
    fn not_produced_block_leaves_cursor_alone() {
        let store = Arc::new(MemoryStore::new());
        store.save_block(4).unwrap();
        let w = walker(store.clone(), PersistFailurePolicy::Skip);

        assert_eq!(w.process(5, Ok(Block::not_yet_produced())), StepOutcome::NotProduced);
        assert_eq!(store.current_block().unwrap(), 4);
        assert_eq!(w.metrics().not_mined_waits.get(), 1);
    }

    #[test]
    fn fetch_error_is_recorded_and_retried() {
        let store = Arc::new(MemoryStore::new());
        let w = walker(store.clone(), PersistFailurePolicy::Skip);

        let outcome = w.process(5, Err(SourceError::Transport("timeout".into())));

        assert!(matches!(outcome, StepOutcome::Retry(_)));
        assert_eq!(store.current_block().unwrap(), 0);
        let status = w.status().snapshot();
        assert_eq!(status.total_fetch_errors, 1);
        assert!(status.last_error.unwrap().contains("timeout"));
    }

    #[test]
    fn mismatched_block_number_is_retried() {
        let store = Arc::new(MemoryStore::new());
        let w = walker(store.clone(), PersistFailurePolicy::Skip);
        assert!(matches!(
            w.process(5, Ok(Block::new(6, vec![]))),
            StepOutcome::Retry(_)
        ));
        assert_eq!(store.current_block().unwrap(), 0);
    }

    #[test]
    fn skip_policy_drops_failed_write_and_advances() {
        let store = Arc::new(FaultyStore::new());
        store.subscribe(&Address::new("0xa")).unwrap();
        store.fail_transaction("0xbad", 1);
        let w = walker(store.clone(), PersistFailurePolicy::Skip);

        let block = Block::new(3, vec![tx("0xbad", "0xa", Some("0xz")), tx("0xok", "0xa", None)]);
        let outcome = w.process(3, Ok(block));

        assert_eq!(outcome, StepOutcome::Advanced { matched: 1, skipped: 1 });
        assert_eq!(store.current_block().unwrap(), 3);
        let hashes: Vec<_> = store
            .transactions_for(&Address::new("0xa"))
            .unwrap()
            .into_iter()
            .map(|t| t.hash)
            .collect();
        assert_eq!(hashes, vec!["0xok".to_string()]);
        assert_eq!(w.status().snapshot().persist_failures, 1);
    }

    #[test]
    fn retry_block_policy_holds_cursor_until_all_writes_succeed() {
        let store = Arc::new(FaultyStore::new());
        store.subscribe(&Address::new("0xa")).unwrap();
        store.fail_transaction("0xbad", 1);
        let w = walker(store.clone(), PersistFailurePolicy::RetryBlock);
        let block = Block::new(3, vec![tx("0xbad", "0xa", None), tx("0xok", "0xa", None)]);

        assert!(matches!(w.process(3, Ok(block.clone())), StepOutcome::Retry(_)));
        assert_eq!(store.current_block().unwrap(), 0);

        assert_eq!(
            w.process(3, Ok(block)),
            StepOutcome::Advanced { matched: 2, skipped: 0 }
        );
        assert_eq!(store.current_block().unwrap(), 3);
        assert_eq!(store.transactions_for(&Address::new("0xa")).unwrap().len(), 2);
    }

    #[test]
    fn failed_cursor_write_is_retried_without_duplicating_entries() {
        let store = Arc::new(FaultyStore::new());
        store.subscribe(&Address::new("0xa")).unwrap();
        store.fail_save_block(1);
        let w = walker(store.clone(), PersistFailurePolicy::Skip);
        let block = Block::new(8, vec![tx("0x1", "0xa", None)]);

        assert!(matches!(w.process(8, Ok(block.clone())), StepOutcome::Retry(_)));
        assert!(matches!(w.process(8, Ok(block)), StepOutcome::Advanced { .. }));
        assert_eq!(store.saved_blocks(), vec![8]);
        assert_eq!(store.transactions_for(&Address::new("0xa")).unwrap().len(), 1);
    }

    #[test]
    fn snapshot_failure_is_retried() {
        let store = Arc::new(FaultyStore::new());
        store.fail_snapshot(1);
        let w = walker(store.clone(), PersistFailurePolicy::Skip);
        assert!(matches!(
            w.process(1, Ok(Block::new(1, vec![]))),
            StepOutcome::Retry(_)
        ));
        assert!(store.saved_blocks().is_empty());
    }
}
