//! Prometheus metrics for LedgerKV

use crate::storage::{INDEX_REHASHES, RECORDS_EVICTED};
use prometheus::{IntCounter, IntGauge, Registry};
use std::sync::atomic::Ordering;

/// Global metrics instance
pub struct Metrics {
    pub registry: Registry,

    // Command counters
    pub cmd_get: IntCounter,
    pub cmd_set: IntCounter,

    // Hit/miss counters
    pub get_hits: IntCounter,
    pub get_misses: IntCounter,

    // Connection metrics
    pub active_connections: IntGauge,
    pub total_connections: IntCounter,

    // Bytes counters
    pub bytes_read: IntCounter,
    pub bytes_written: IntCounter,

    // Error counters
    pub protocol_errors: IntCounter,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        let registry = Registry::new();

        let cmd_get = IntCounter::new("ledgerkv_cmd_get_total", "Total get commands").unwrap();
        let cmd_set = IntCounter::new("ledgerkv_cmd_set_total", "Total set commands").unwrap();

        let get_hits = IntCounter::new("ledgerkv_get_hits_total", "Total get hits").unwrap();
        let get_misses = IntCounter::new("ledgerkv_get_misses_total", "Total get misses").unwrap();

        let active_connections =
            IntGauge::new("ledgerkv_active_connections", "Current active connections").unwrap();
        let total_connections =
            IntCounter::new("ledgerkv_connections_total", "Total connections accepted").unwrap();

        let bytes_read = IntCounter::new("ledgerkv_bytes_read_total", "Total bytes read").unwrap();
        let bytes_written =
            IntCounter::new("ledgerkv_bytes_written_total", "Total bytes written").unwrap();

        let protocol_errors =
            IntCounter::new("ledgerkv_protocol_errors_total", "Total protocol errors").unwrap();

        registry.register(Box::new(cmd_get.clone())).unwrap();
        registry.register(Box::new(cmd_set.clone())).unwrap();
        registry.register(Box::new(get_hits.clone())).unwrap();
        registry.register(Box::new(get_misses.clone())).unwrap();
        registry
            .register(Box::new(active_connections.clone()))
            .unwrap();
        registry
            .register(Box::new(total_connections.clone()))
            .unwrap();
        registry.register(Box::new(bytes_read.clone())).unwrap();
        registry.register(Box::new(bytes_written.clone())).unwrap();
        registry
            .register(Box::new(protocol_errors.clone()))
            .unwrap();

        Self {
            registry,
            cmd_get,
            cmd_set,
            get_hits,
            get_misses,
            active_connections,
            total_connections,
            bytes_read,
            bytes_written,
            protocol_errors,
        }
    }

    /// Get Prometheus formatted metrics
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        let mut output = String::from_utf8(buffer).unwrap();

        // Storage-side counters live as static atomics on the hot path.
        let evicted = RECORDS_EVICTED.load(Ordering::Relaxed);
        let rehashes = INDEX_REHASHES.load(Ordering::Relaxed);

        output.push_str(&format!(
            "\n# HELP ledgerkv_records_evicted_total Records dropped by LRU eviction\n\
             # TYPE ledgerkv_records_evicted_total counter\n\
             ledgerkv_records_evicted_total {evicted}\n"
        ));

        output.push_str(&format!(
            "\n# HELP ledgerkv_index_rehashes_total Hash index growth events\n\
             # TYPE ledgerkv_index_rehashes_total counter\n\
             ledgerkv_index_rehashes_total {rehashes}\n"
        ));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
