//! Internal metrics collection.
//!
//! Plain atomics; `/metrics` serves a JSON snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 10ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s, 30s
    buckets: [AtomicU64; 10],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 10] = [10, 50, 100, 250, 500, 1000, 2500, 5000, 10000, 30000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum.load(Ordering::Relaxed) as f64 / count as f64
        }
    }

    /// Returns (upper bound, count) pairs.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the console.
#[derive(Debug, Default)]
pub struct Metrics {
    // Proxy operations
    pub consumers_listed: Counter,
    pub consumers_created: Counter,
    pub consumers_updated: Counter,
    pub consumers_deleted: Counter,
    pub usage_queries: Counter,
    pub unexpected_envelopes: Counter,

    // Upstream failures
    pub upstream_rejections: Counter,
    pub transport_failures: Counter,

    // Client cache
    pub cache_hits: Counter,
    pub cache_misses: Counter,
    pub cache_revalidations: Counter,

    pub upstream_latency_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            consumers_listed: self.consumers_listed.get(),
            consumers_created: self.consumers_created.get(),
            consumers_updated: self.consumers_updated.get(),
            consumers_deleted: self.consumers_deleted.get(),
            usage_queries: self.usage_queries.get(),
            unexpected_envelopes: self.unexpected_envelopes.get(),
            upstream_rejections: self.upstream_rejections.get(),
            transport_failures: self.transport_failures.get(),
            cache_hits: self.cache_hits.get(),
            cache_misses: self.cache_misses.get(),
            cache_revalidations: self.cache_revalidations.get(),
            upstream_calls: self.upstream_latency_ms.count(),
            upstream_latency_mean_ms: self.upstream_latency_ms.mean(),
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub consumers_listed: u64,
    pub consumers_created: u64,
    pub consumers_updated: u64,
    pub consumers_deleted: u64,
    pub usage_queries: u64,
    pub unexpected_envelopes: u64,
    pub upstream_rejections: u64,
    pub transport_failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_revalidations: u64,
    pub upstream_calls: u64,
    pub upstream_latency_mean_ms: f64,
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
