//! Watcher configuration with TOML file support.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::LogFormat;
use crate::NodeError;

/// Where the watch state lives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-lifetime only; a restart starts from an empty state.
    #[default]
    Memory,
    /// LMDB environment under `data_dir`; survives restarts.
    Lmdb,
}

impl FromStr for StorageBackend {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "lmdb" => Ok(Self::Lmdb),
            other => Err(NodeError::Config(format!(
                "unknown storage backend `{other}` (expected `memory` or `lmdb`)"
            ))),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Lmdb => f.write_str("lmdb"),
        }
    }
}

/// What the walker does when a matched transaction cannot be persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistFailurePolicy {
    /// Log and count the failure, drop that one transaction, and still
    /// advance past the block.
    #[default]
    Skip,
    /// Log and count the failure, keep the cursor where it is, and re-run
    /// the whole block after a backoff delay.
    RetryBlock,
}

/// Backoff settings for failed fetches and store operations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor applied after each consecutive failure.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Proportional jitter in `[0, 1]`: a delay `d` becomes a value drawn
    /// from `d * [1 - jitter, 1 + jitter]`.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

/// Configuration for a chainwatch process.
///
/// Can be loaded from a TOML file via [`WatcherConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default, so an
/// empty file is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// JSON-RPC endpoint of the ledger node.
    #[serde(default = "default_rpc_endpoint")]
    pub rpc_endpoint: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Start at the ledger head (`true`) or resume after the saved cursor.
    #[serde(default = "default_true")]
    pub live: bool,

    #[serde(default)]
    pub storage: StorageBackend,

    /// Directory for the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    /// Whether to serve the HTTP query API.
    #[serde(default = "default_true")]
    pub enable_api: bool,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Seconds to wait before re-asking for a block that is not produced yet.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub persist_failure_policy: PersistFailurePolicy,

    /// Addresses subscribed at startup, in addition to any already stored.
    #[serde(default)]
    pub subscriptions: Vec<String>,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to expose Prometheus metrics on `/metrics`.
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_rpc_endpoint() -> String {
    "https://ethereum-rpc.publicnode.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./chainwatch_data")
}

fn default_lmdb_map_size() -> usize {
    1 << 30
}

fn default_api_port() -> u16 {
    8080
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_initial_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.2
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl WatcherConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(format!("{path}: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject values the walker cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.rpc_endpoint.trim().is_empty() {
            return Err(NodeError::Config("rpc_endpoint must not be empty".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(NodeError::Config("poll_interval_secs must be at least 1".into()));
        }
        if self.storage == StorageBackend::Lmdb && self.lmdb_map_size == 0 {
            return Err(NodeError::Config("lmdb_map_size must be non-zero".into()));
        }
        self.retry.validate()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(NodeError::Config("retry.multiplier must be >= 1.0".into()));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(NodeError::Config("retry.jitter must be within [0, 1]".into()));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(NodeError::Config(
                "retry.initial_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: default_rpc_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
            live: default_true(),
            storage: StorageBackend::default(),
            data_dir: default_data_dir(),
            lmdb_map_size: default_lmdb_map_size(),
            enable_api: default_true(),
            api_port: default_api_port(),
            poll_interval_secs: default_poll_interval_secs(),
            retry: RetryConfig::default(),
            persist_failure_policy: PersistFailurePolicy::default(),
            subscriptions: Vec::new(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            enable_metrics: default_true(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = WatcherConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = WatcherConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.api_port, config.api_port);
        assert_eq!(parsed.rpc_endpoint, config.rpc_endpoint);
        assert_eq!(parsed.retry, config.retry);
        assert_eq!(parsed.storage, StorageBackend::Memory);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = WatcherConfig::from_toml_str("").expect("empty toml should use defaults");
        assert!(config.live);
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.persist_failure_policy, PersistFailurePolicy::Skip);
        assert_eq!(config.log_format, LogFormat::Human);
        assert_eq!(config.retry.initial_delay_ms, 250);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            live = false
            storage = "lmdb"
            persist_failure_policy = "retry_block"
            subscriptions = ["0xABC", "0xdef"]

            [retry]
            max_delay_ms = 5000
        "#;
        let config = WatcherConfig::from_toml_str(toml).expect("should parse");
        assert!(!config.live);
        assert_eq!(config.storage, StorageBackend::Lmdb);
        assert_eq!(config.persist_failure_policy, PersistFailurePolicy::RetryBlock);
        assert_eq!(config.subscriptions.len(), 2);
        assert_eq!(config.retry.max_delay_ms, 5000);
        assert_eq!(config.retry.multiplier, 2.0); // default
    }

    #[test]
    fn unknown_enum_value_is_rejected() {
        let err = WatcherConfig::from_toml_str(r#"storage = "postgres""#).unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }

    #[test]
    fn invalid_retry_settings_are_rejected() {
        for toml in [
            "[retry]\nmultiplier = 0.5",
            "[retry]\njitter = 1.5",
            "[retry]\ninitial_delay_ms = 10\nmax_delay_ms = 5",
            "poll_interval_secs = 0",
        ] {
            assert!(WatcherConfig::from_toml_str(toml).is_err(), "{toml}");
        }
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = WatcherConfig::from_toml_file("/nonexistent/chainwatch.toml");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn storage_backend_parses_from_cli_text() {
        assert_eq!("LMDB".parse::<StorageBackend>().unwrap(), StorageBackend::Lmdb);
        assert!("disk".parse::<StorageBackend>().is_err());
    }
}
