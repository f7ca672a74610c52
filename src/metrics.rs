//! Lookup latency and cache counters, logged when the binary exits.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

/// Samples kept per latency metric; older ones roll off.
const WINDOW: usize = 512;

pub mod metric_names {
    pub const PROVIDER_TRANSLATE: &str = "provider_translate";
    pub const PROVIDER_DETAIL: &str = "provider_detail";
    pub const CHANNEL_ROUND_TRIP: &str = "channel_round_trip";
    pub const CACHE_HIT: &str = "cache_hit";
    pub const CACHE_MISS: &str = "cache_miss";
    pub const CHANNEL_TIMEOUT: &str = "channel_timeout";
}

/// Started by [`MetricsRegistry::span`]; records on [`finish`](Self::finish).
pub struct TimingSpan {
    name: &'static str,
    started: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    /// Elapsed microseconds, also recorded under the span's name.
    pub fn finish(self) -> f64 {
        let us = self.started.elapsed().as_secs_f64() * 1e6;
        self.registry.record(self.name, us);
        us
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}

#[derive(Default)]
struct Tables {
    latencies: HashMap<&'static str, VecDeque<f64>>,
    counters: HashMap<&'static str, u64>,
}

#[derive(Default)]
pub struct MetricsRegistry {
    tables: Mutex<Tables>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &'static str, value_us: f64) {
        let mut tables = self.tables.lock();
        let window = tables.latencies.entry(name).or_default();
        if window.len() == WINDOW {
            window.pop_front();
        }
        window.push_back(value_us);
        tracing::trace!(metric = name, value_us, "latency sample");
    }

    pub fn incr(&self, name: &'static str) {
        *self.tables.lock().counters.entry(name).or_default() += 1;
    }

    pub fn count(&self, name: &str) -> u64 {
        self.tables.lock().counters.get(name).copied().unwrap_or(0)
    }

    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan {
            name,
            started: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    /// Share of cache lookups answered without I/O, `None` before the first lookup.
    pub fn cache_hit_ratio(&self) -> Option<f64> {
        let hits = self.count(metric_names::CACHE_HIT);
        let total = hits + self.count(metric_names::CACHE_MISS);
        (total > 0).then(|| hits as f64 / total as f64)
    }

    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        let tables = self.tables.lock();
        tables
            .latencies
            .iter()
            .map(|(name, window)| {
                let mut sorted: Vec<f64> = window.iter().copied().collect();
                sorted.sort_by(f64::total_cmp);
                let summary = MetricSummary {
                    p50_us: nearest_rank(&sorted, 50.0),
                    p95_us: nearest_rank(&sorted, 95.0),
                    p99_us: nearest_rank(&sorted, 99.0),
                    count: sorted.len(),
                };
                (name.to_string(), summary)
            })
            .collect()
    }
}

/// Nearest-rank percentile of an ascending slice; 0 when empty.
fn nearest_rank(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
