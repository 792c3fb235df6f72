//! Watcher: owns the store, the ledger source and the walker task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use chainwatch_source::{JsonRpcSource, LedgerSource};
use chainwatch_store::{CursorStore, MemoryStore, SubscriptionStore, WatchStore};
use chainwatch_store_lmdb::LmdbStore;
use chainwatch_types::Address;

use crate::config::{StorageBackend, WatcherConfig};
use crate::metrics::WatcherMetrics;
use crate::shutdown::{ShutdownController, ShutdownSignal};
use crate::status::StatusHandle;
use crate::walker::{ChainWalker, WalkerConfig, WalkerExit};
use crate::NodeError;

/// Upper bound on waiting for the walker task after shutdown is signalled.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Watcher {
    config: WatcherConfig,
    store: Arc<dyn WatchStore>,
    /// Kept alongside `store` so the environment can be flushed on stop.
    lmdb: Option<LmdbStore>,
    source: Arc<dyn LedgerSource>,
    metrics: Arc<WatcherMetrics>,
    status: StatusHandle,
    shutdown: Arc<ShutdownController>,
    walker_task: Option<JoinHandle<WalkerExit>>,
}

impl Watcher {
    /// Open the configured store and connect the JSON-RPC source.
    pub fn new(config: WatcherConfig) -> Result<Self, NodeError> {
        config.validate()?;

        let source: Arc<dyn LedgerSource> = Arc::new(JsonRpcSource::with_timeout(
            &config.rpc_endpoint,
            config.request_timeout(),
        ));

        match config.storage {
            StorageBackend::Memory => {
                tracing::info!("using in-memory store; state will not survive a restart");
                Ok(Self::with_parts(config, Arc::new(MemoryStore::new()), source))
            }
            StorageBackend::Lmdb => {
                let lmdb = LmdbStore::open(&config.data_dir, config.lmdb_map_size)?;
                tracing::info!(data_dir = %config.data_dir.display(), "opened LMDB store");
                let mut watcher = Self::with_parts(config, Arc::new(lmdb.clone()), source);
                watcher.lmdb = Some(lmdb);
                Ok(watcher)
            }
        }
    }

    /// Assemble a watcher from ready-made parts (tests, embedding).
    pub fn with_parts(
        config: WatcherConfig,
        store: Arc<dyn WatchStore>,
        source: Arc<dyn LedgerSource>,
    ) -> Self {
        Self {
            config,
            store,
            lmdb: None,
            source,
            metrics: Arc::new(WatcherMetrics::new()),
            status: StatusHandle::new(),
            shutdown: Arc::new(ShutdownController::new()),
            walker_task: None,
        }
    }

    /// Subscribe every address listed in the configuration. Returns how many
    /// were newly added; blank entries are ignored.
    pub fn subscribe_initial(&self) -> Result<usize, NodeError> {
        let mut added = 0;
        for raw in &self.config.subscriptions {
            let Ok(address) = Address::parse(raw) else {
                tracing::warn!(entry = %raw, "ignoring blank subscription in config");
                continue;
            };
            if self.store.subscribe(&address)? {
                added += 1;
            }
        }
        self.metrics
            .subscriptions
            .set(self.store.subscription_count()? as i64);
        Ok(added)
    }

    /// Spawn the walker task.
    pub fn start(&mut self) -> Result<(), NodeError> {
        if self.walker_task.is_some() {
            return Err(NodeError::WalkerTask("walker already started".into()));
        }

        let cursor = self.store.current_block()?;
        self.metrics.cursor_height.set(cursor as i64);
        tracing::info!(
            live = self.config.live,
            cursor,
            subscriptions = self.store.subscription_count()?,
            endpoint = %self.config.rpc_endpoint,
            "starting chain walker"
        );

        let walker = ChainWalker::new(
            Arc::clone(&self.store),
            Arc::clone(&self.source),
            WalkerConfig::from(&self.config),
            self.shutdown.subscribe(),
        )
        .with_metrics(Arc::clone(&self.metrics))
        .with_status(self.status.clone());

        self.walker_task = Some(tokio::spawn(walker.run()));
        Ok(())
    }

    /// Signal shutdown and wait for the walker to finish its current pass.
    pub async fn stop(&mut self) -> Result<WalkerExit, NodeError> {
        tracing::info!("watcher stopping");
        self.shutdown.shutdown();

        let exit = match self.walker_task.take() {
            Some(handle) => match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(exit)) => exit,
                Ok(Err(e)) => return Err(NodeError::WalkerTask(e.to_string())),
                Err(_) => {
                    return Err(NodeError::WalkerTask(format!(
                        "walker did not stop within {SHUTDOWN_TIMEOUT:?}"
                    )))
                }
            },
            None => WalkerExit {
                last_processed: None,
            },
        };

        if let Some(lmdb) = &self.lmdb {
            lmdb.sync()?;
        }
        tracing::info!(last_processed = ?exit.last_processed, "watcher stopped");
        Ok(exit)
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn WatchStore> {
        Arc::clone(&self.store)
    }

    pub fn source(&self) -> Arc<dyn LedgerSource> {
        Arc::clone(&self.source)
    }

    pub fn metrics(&self) -> Arc<WatcherMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistFailurePolicy;
    use chainwatch_nullables::NullLedgerSource;

    fn config(subscriptions: &[&str]) -> WatcherConfig {
        WatcherConfig {
            live: false,
            persist_failure_policy: PersistFailurePolicy::Skip,
            subscriptions: subscriptions.iter().map(|s| s.to_string()).collect(),
            ..WatcherConfig::default()
        }
    }

    #[test]
    fn initial_subscriptions_are_normalized_and_deduplicated() {
        let watcher = Watcher::with_parts(
            config(&["0xABC", "0xabc", "  ", "0xdef"]),
            Arc::new(MemoryStore::new()),
            Arc::new(NullLedgerSource::new()),
        );
        assert_eq!(watcher.subscribe_initial().unwrap(), 2);
        assert_eq!(watcher.store().subscription_count().unwrap(), 2);
        assert_eq!(watcher.metrics().subscriptions.get(), 2);
    }

    #[tokio::test]
    async fn stop_without_start_reports_nothing_processed() {
        let mut watcher = Watcher::with_parts(
            config(&[]),
            Arc::new(MemoryStore::new()),
            Arc::new(NullLedgerSource::new()),
        );
        assert_eq!(watcher.stop().await.unwrap().last_processed, None);
    }

    #[tokio::test]
    async fn starting_twice_is_an_error() {
        let mut watcher = Watcher::with_parts(
            config(&[]),
            Arc::new(MemoryStore::new()),
            Arc::new(NullLedgerSource::new()),
        );
        watcher.start().unwrap();
        assert!(matches!(watcher.start(), Err(NodeError::WalkerTask(_))));
        watcher.stop().await.unwrap();
    }

    #[test]
    fn lmdb_backend_opens_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = WatcherConfig {
            storage: StorageBackend::Lmdb,
            data_dir: dir.path().join("state"),
            lmdb_map_size: 16 << 20,
            ..config(&["0xa"])
        };
        let watcher = Watcher::new(config).unwrap();
        assert_eq!(watcher.subscribe_initial().unwrap(), 1);
        assert!(dir.path().join("state").join("data.mdb").exists());
    }
}
