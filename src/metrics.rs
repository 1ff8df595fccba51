// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the cluster DNS synchronizer.
//!
//! Every metric carries the `clusterdns_` prefix.
//!
//! # Metrics Categories
//!
//! - **Event Metrics** - Watch events handled, their duration, and dropped events
//! - **Zone Metrics** - Mutations written to the zone and RRsets currently held
//! - **Derivation Metrics** - Records skipped because their input was malformed
//!
//! # Example
//!
//! ```rust,no_run
//! use clusterdns::metrics::{gather_metrics, record_event};
//!
//! record_event("Service", "create");
//! let text = gather_metrics().unwrap();
//! ```

use hickory_client::rr::RecordType;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics
const METRICS_NAMESPACE: &str = "clusterdns";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via the `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Event Metrics
// ============================================================================

/// Total number of watch events handled
///
/// Labels:
/// - `kind`: `Service` or `Endpoints`
/// - `operation`: `create`, `update`, `delete`, `generic`
pub static EVENTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_events_total"),
        "Total number of watch events handled by kind and operation",
    );
    let counter = CounterVec::new(opts, &["kind", "operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Time spent handling one event, zone writes included
///
/// Labels:
/// - `kind`: `Service` or `Endpoints`
pub static EVENT_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_event_duration_seconds"),
        "Duration of event handling in seconds by kind",
    )
    .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]);
    let histogram = HistogramVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Events that produced no mutations because a precondition failed
///
/// Labels:
/// - `kind`: `Service` or `Endpoints`
/// - `reason`: e.g. `service_not_found`
pub static EVENTS_DROPPED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_events_dropped_total"),
        "Total number of events dropped by kind and reason",
    );
    let counter = CounterVec::new(opts, &["kind", "reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Zone Metrics
// ============================================================================

/// Total number of RRset replacements and deletions written to the zone
///
/// Labels:
/// - `record_type`: `A`, `AAAA`, `PTR`, `SRV`, `CNAME`
/// - `operation`: `replace` or `delete`
pub static ZONE_MUTATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_zone_mutations_total"),
        "Total number of zone mutations by record type and operation",
    );
    let counter = CounterVec::new(opts, &["record_type", "operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Number of RRsets currently held by the in-memory zone
///
/// Labels:
/// - `partition`: `service` or `reverse`
pub static ZONE_RRSETS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_zone_rrsets"),
        "Number of RRsets held by the zone by partition",
    );
    let gauge = GaugeVec::new(opts, &["partition"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Derivation Metrics
// ============================================================================

/// Records that were not published because their input could not be used
///
/// Labels:
/// - `reason`: `invalid_address`, `invalid_name`, `invalid_port`
pub static SKIPPED_DERIVATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_skipped_derivations_total"),
        "Total number of records skipped because of malformed input, by reason",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a handled watch event
///
/// # Arguments
/// * `kind` - `Service` or `Endpoints`
/// * `operation` - Event operation (`create`, `update`, `delete`, `generic`)
pub fn record_event(kind: &str, operation: &str) {
    EVENTS_TOTAL.with_label_values(&[kind, operation]).inc();
}

/// Record how long handling one event took
pub fn record_event_duration(kind: &str, duration: Duration) {
    EVENT_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Record an event that was dropped before any mutation was computed
///
/// # Arguments
/// * `kind` - `Service` or `Endpoints`
/// * `reason` - Why it was dropped (e.g. `service_not_found`)
pub fn record_event_dropped(kind: &str, reason: &str) {
    EVENTS_DROPPED_TOTAL.with_label_values(&[kind, reason]).inc();
}

/// Record one zone mutation
pub fn record_mutation(record_type: RecordType, is_delete: bool) {
    let operation = if is_delete { "delete" } else { "replace" };
    let record_type = record_type.to_string();
    ZONE_MUTATIONS_TOTAL
        .with_label_values(&[record_type.as_str(), operation])
        .inc();
}

/// Record a derivation that was skipped
pub fn record_skipped_derivation(reason: &str) {
    SKIPPED_DERIVATIONS_TOTAL.with_label_values(&[reason]).inc();
}

/// Set the current RRset count of a zone partition
#[allow(clippy::cast_precision_loss)]
pub fn record_zone_size(partition: &str, rrsets: usize) {
    ZONE_RRSETS.with_label_values(&[partition]).set(rrsets as f64);
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
