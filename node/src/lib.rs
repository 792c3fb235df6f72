//! chainwatch node: walks the ledger block by block and records every
//! transaction that touches a subscribed address.
//!
//! - [`walker`]: the block-walking loop and its per-block pass
//! - [`watcher`]: wiring of store, ledger source, and walker task
//! - [`config`], [`logging`], [`metrics`], [`shutdown`]: process plumbing

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod retry;
pub mod shutdown;
pub mod status;
pub mod tracing_spans;
pub mod walker;
pub mod watcher;

pub use config::{PersistFailurePolicy, RetryConfig, StorageBackend, WatcherConfig};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::WatcherMetrics;
pub use retry::{Backoff, RetryPolicy};
pub use shutdown::{ShutdownController, ShutdownSignal};
pub use status::{StatusHandle, WalkerState, WalkerStatus};
pub use walker::{ChainWalker, StepOutcome, WalkerConfig, WalkerExit};
pub use watcher::Watcher;
