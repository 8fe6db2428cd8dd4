// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the SimpleGSLB controller.
//!
//! All metrics live in a process-global registry exposed on `/metrics` with
//! the namespace prefix `simplegslb_cyberun_cloud` (prometheus-safe version
//! of "simplegslb.cyberun.cloud").
//!
//! # Metric Categories
//!
//! - **Probe Metrics** - outcomes and latency of health probes
//! - **Tick Metrics** - probe-cycle duration and overruns
//! - **Spec Metrics** - watch events and ingress rejections
//! - **Publish Metrics** - generation publishes, skips, and reload signals

use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all SimpleGSLB metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "simplegslb_cyberun_cloud";

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Probe Metrics
// ============================================================================

/// Total number of probes by protocol and outcome
///
/// Labels:
/// - `protocol`: probe kind (`http`, `https`, `tcp`)
/// - `outcome`: `up` or `down`
pub static PROBES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_probes_total"),
        "Total number of health probes by protocol and outcome",
    );
    let counter = CounterVec::new(opts, &["protocol", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of individual probes in seconds
///
/// Labels:
/// - `protocol`: probe kind (`http`, `https`, `tcp`)
pub static PROBE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_probe_duration_seconds"),
        "Duration of individual health probes in seconds by protocol",
    )
    .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]);
    let histogram = HistogramVec::new(opts, &["protocol"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Targets currently tracked by the health table
pub static TARGETS_TRACKED: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_targets_tracked"),
        "Number of targets currently tracked by the health table",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Targets currently answering (probe status up)
pub static TARGETS_HEALTHY: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_targets_healthy"),
        "Number of targets whose latest probe succeeded",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Tick Metrics
// ============================================================================

/// Duration of full probe+synthesize+publish cycles in seconds
pub static TICK_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_tick_duration_seconds"),
        "Duration of full probe, synthesize and publish cycles in seconds",
    )
    .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    let histogram = Histogram::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Ticks whose runtime exceeded the probe interval (next tick skipped)
pub static TICK_OVERRUNS_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let counter = Counter::new(
        format!("{METRICS_NAMESPACE}_tick_overruns_total"),
        "Ticks whose runtime exceeded the probe interval, causing the next tick to be skipped",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Spec Metrics
// ============================================================================

/// Watch events consumed from the platform
///
/// Labels:
/// - `event`: `apply`, `delete`, `relist`
pub static WATCH_EVENTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_watch_events_total"),
        "Watch events consumed from the Kubernetes API by event kind",
    );
    let counter = CounterVec::new(opts, &["event"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Watch stream errors (reconnected with backoff)
pub static WATCH_ERRORS_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let counter = Counter::new(
        format!("{METRICS_NAMESPACE}_watch_errors_total"),
        "Watch stream errors, each followed by a backoff reconnect",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Objects rejected by ingress validation
///
/// Labels:
/// - `reason`: stable rejection reason (see `ValidationError::reason`)
pub static SPECS_REJECTED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_specs_rejected_total"),
        "GslbConfig objects rejected by ingress validation, by reason",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Configs currently held by the Spec Store
pub static SPECS_ACTIVE: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_specs_active"),
        "GslbConfig objects currently held by the spec store",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Synthesis & Publish Metrics
// ============================================================================

/// Per-config synthesis failures (config skipped, previous files kept)
pub static SYNTHESIS_ERRORS_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let counter = Counter::new(
        format!("{METRICS_NAMESPACE}_synthesis_errors_total"),
        "Per-config synthesis failures; the config is skipped and its previous files kept",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Publish attempts by outcome
///
/// Labels:
/// - `outcome`: `published`, `unchanged`, `error`
pub static PUBLISH_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_publish_total"),
        "Generation publish attempts by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Files in the most recently published generation
pub static GENERATION_FILES: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_generation_files"),
        "Number of files in the most recently published generation",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Reload signals sent after a publish, by outcome
///
/// Labels:
/// - `outcome`: `ok`, `error`
pub static RELOAD_SIGNALS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reload_signals_total"),
        "Best-effort reload signals sent after a publish, by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Recording Helpers
// ============================================================================

/// Record one probe outcome with its duration.
pub fn record_probe(protocol: &str, healthy: bool, duration: Duration) {
    let outcome = if healthy { "up" } else { "down" };
    PROBES_TOTAL.with_label_values(&[protocol, outcome]).inc();
    PROBE_DURATION_SECONDS
        .with_label_values(&[protocol])
        .observe(duration.as_secs_f64());
}

/// Record a completed tick; `overran` marks ticks longer than the interval.
pub fn record_tick(duration: Duration, overran: bool) {
    TICK_DURATION_SECONDS.observe(duration.as_secs_f64());
    if overran {
        TICK_OVERRUNS_TOTAL.inc();
    }
}

/// Record one consumed watch event.
pub fn record_watch_event(event: &str) {
    WATCH_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

/// Record a watch stream error.
pub fn record_watch_error() {
    WATCH_ERRORS_TOTAL.inc();
}

/// Record an ingress rejection.
pub fn record_spec_rejected(reason: &str) {
    SPECS_REJECTED_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a publish attempt outcome (`published`, `unchanged`, `error`).
pub fn record_publish(outcome: &str) {
    PUBLISH_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a reload signal outcome.
pub fn record_reload_signal(ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    RELOAD_SIGNALS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a per-config synthesis failure.
pub fn record_synthesis_error() {
    SYNTHESIS_ERRORS_TOTAL.inc();
}

/// Update the health gauges after a tick.
#[allow(clippy::cast_precision_loss)]
pub fn set_target_gauges(tracked: usize, healthy: usize) {
    TARGETS_TRACKED.set(tracked as f64);
    TARGETS_HEALTHY.set(healthy as f64);
}

/// Update the active-spec gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_specs_active(count: usize) {
    SPECS_ACTIVE.set(count as f64);
}

/// Update the generation-file gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_generation_files(count: usize) {
    GENERATION_FILES.set(count as f64);
}

/// Gather all metrics in Prometheus text exposition format.
///
/// # Errors
///
/// Returns an error if encoding the metric families fails.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}
