//! Prometheus metrics for the watcher.
//!
//! [`WatcherMetrics`] owns a dedicated [`Registry`] that the `/metrics`
//! endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

/// Central collection of all watcher-level Prometheus metrics.
pub struct WatcherMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Blocks fully classified and committed to the cursor.
    pub blocks_processed: IntCounter,
    /// Transactions persisted under a subscribed address (one per bucket).
    pub transactions_matched: IntCounter,
    /// Failed block or head fetches, snapshot reads, and cursor writes.
    pub fetch_errors: IntCounter,
    /// Polls that found the target block not produced yet.
    pub not_mined_waits: IntCounter,
    /// Matched transactions that could not be written.
    pub persist_failures: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub cursor_height: IntGauge,
    pub subscriptions: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time spent classifying and persisting one block, in milliseconds.
    pub block_process_time_ms: Histogram,
}

impl WatcherMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let blocks_processed = register_int_counter_with_registry!(
            Opts::new(
                "chainwatch_blocks_processed_total",
                "Total blocks processed by the walker"
            ),
            registry
        )
        .expect("failed to register blocks_processed counter");

        let transactions_matched = register_int_counter_with_registry!(
            Opts::new(
                "chainwatch_transactions_matched_total",
                "Total transactions recorded under a subscribed address"
            ),
            registry
        )
        .expect("failed to register transactions_matched counter");

        let fetch_errors = register_int_counter_with_registry!(
            Opts::new(
                "chainwatch_fetch_errors_total",
                "Total failed ledger fetches and store reads"
            ),
            registry
        )
        .expect("failed to register fetch_errors counter");

        let not_mined_waits = register_int_counter_with_registry!(
            Opts::new(
                "chainwatch_not_mined_waits_total",
                "Total waits for a block that was not produced yet"
            ),
            registry
        )
        .expect("failed to register not_mined_waits counter");

        let persist_failures = register_int_counter_with_registry!(
            Opts::new(
                "chainwatch_persist_failures_total",
                "Total matched transactions that failed to persist"
            ),
            registry
        )
        .expect("failed to register persist_failures counter");

        let cursor_height = register_int_gauge_with_registry!(
            Opts::new(
                "chainwatch_cursor_height",
                "Height of the last fully processed block"
            ),
            registry
        )
        .expect("failed to register cursor_height gauge");

        let subscriptions = register_int_gauge_with_registry!(
            Opts::new("chainwatch_subscriptions", "Current number of subscribed addresses"),
            registry
        )
        .expect("failed to register subscriptions gauge");

        // Exponential buckets covering 0.1 ms → ~1.6 s.
        let block_process_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "chainwatch_block_process_time_ms",
                "Block classification and persistence time in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(0.1, 2.0, 15).unwrap()),
            registry
        )
        .expect("failed to register block_process_time_ms histogram");

        Self {
            registry,
            blocks_processed,
            transactions_matched,
            fetch_errors,
            not_mined_waits,
            persist_failures,
            cursor_height,
            subscriptions,
            block_process_time_ms,
        }
    }

    /// Encode every registered metric in the text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for WatcherMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_exposes_every_metric_family() {
        let metrics = WatcherMetrics::new();
        metrics.blocks_processed.inc();
        metrics.cursor_height.set(42);
        metrics.block_process_time_ms.observe(1.5);

        let text = metrics.encode().unwrap();
        for name in [
            "chainwatch_blocks_processed_total 1",
            "chainwatch_transactions_matched_total 0",
            "chainwatch_fetch_errors_total 0",
            "chainwatch_not_mined_waits_total 0",
            "chainwatch_persist_failures_total 0",
            "chainwatch_cursor_height 42",
            "chainwatch_subscriptions 0",
            "chainwatch_block_process_time_ms_count 1",
        ] {
            assert!(text.contains(name), "missing `{name}` in:\n{text}");
        }
    }

    #[test]
    fn registries_are_independent() {
        let a = WatcherMetrics::new();
        let b = WatcherMetrics::new();
        a.fetch_errors.inc_by(3);
        assert_eq!(b.fetch_errors.get(), 0);
    }
}
