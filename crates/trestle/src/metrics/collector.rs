//! In-memory Metrics Collector
//!
//! Counters, gauges and timer sample reservoirs keyed by
//! `(name, tag-set)`, plus a bounded ring of raw [`MetricEvent`]s.
//! Timer reservoirs are bounded at construction (oldest sample dropped
//! first), as is the event history.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::sink::TelemetrySink;
use super::{DistributionSummary, MetricEvent, MetricKey, MetricKind, Tags, render_key};
use crate::clock::epoch_ms;

const DEFAULT_HISTORY_CAPACITY: usize = 10_000;
const DEFAULT_TIMER_CAPACITY: usize = 4_096;

/// Point-in-time view of every metric family, keyed by rendered identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, f64>,
    pub gauges: HashMap<String, f64>,
    pub timers: HashMap<String, DistributionSummary>,
}

/// Builder for [`MetricsCollector`].
#[derive(Default)]
pub struct MetricsCollectorBuilder {
    sink: Option<Arc<dyn TelemetrySink>>,
    history_capacity: Option<usize>,
    timer_capacity: Option<usize>,
}

impl MetricsCollectorBuilder {
    /// Inject the telemetry sink that domain events forward to.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Cap on retained raw events (default 10,000).
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = Some(capacity);
        self
    }

    /// Cap on retained samples per timer key (default 4,096).
    pub fn with_timer_capacity(mut self, capacity: usize) -> Self {
        self.timer_capacity = Some(capacity);
        self
    }

    pub fn build(self) -> MetricsCollector {
        MetricsCollector {
            counters: DashMap::new(),
            gauges: DashMap::new(),
            timers: DashMap::new(),
            history: Mutex::new(VecDeque::new()),
            history_capacity: self.history_capacity.unwrap_or(DEFAULT_HISTORY_CAPACITY),
            timer_capacity: self.timer_capacity.unwrap_or(DEFAULT_TIMER_CAPACITY),
            sink: self.sink,
            started: Instant::now(),
        }
    }
}

/// In-process telemetry store.
///
/// All recording operations take `&self`; the collector is safe to share
/// behind an `Arc` across tasks and threads.
pub struct MetricsCollector {
    counters: DashMap<MetricKey, f64>,
    gauges: DashMap<MetricKey, f64>,
    timers: DashMap<MetricKey, VecDeque<f64>>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    timer_capacity: usize,
    sink: Option<Arc<dyn TelemetrySink>>,
    started: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MetricsCollectorBuilder {
        MetricsCollectorBuilder::default()
    }

    /// Time elapsed since the collector was constructed.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    // ── Recording ──────────────────────────────────────────────────────

    /// Add `delta` to the running total for `(name, tags)`.
    pub fn increment_counter(&self, name: &str, delta: f64, tags: Tags) {
        let key = MetricKey::new(name, tags.clone());
        let mut entry = self.counters.entry(key).or_insert(0.0);
        *entry += delta;
        let total = *entry;
        drop(entry);
        self.record_event(name, MetricKind::Counter, total, tags);
    }

    /// Overwrite the last-known value for `(name, tags)`.
    pub fn set_gauge(&self, name: &str, value: f64, tags: Tags) {
        self.gauges.insert(MetricKey::new(name, tags.clone()), value);
        self.record_event(name, MetricKind::Gauge, value, tags);
    }

    /// Push one duration sample into the key's bounded reservoir.
    pub fn record_timer(&self, name: &str, duration_ms: f64, tags: Tags) {
        let key = MetricKey::new(name, tags.clone());
        let mut samples = self.timers.entry(key).or_default();
        samples.push_back(duration_ms);
        while samples.len() > self.timer_capacity {
            samples.pop_front();
        }
        drop(samples);
        self.record_event(name, MetricKind::Timer, duration_ms, tags);
    }

    /// Run an async operation, recording its wall-time as a timer sample.
    ///
    /// On failure the tag `error="true"` is added to the recorded sample
    /// and the error is returned unchanged.
    pub async fn time_async<T, E, F>(&self, name: &str, tags: Tags, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let result = operation.await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(_) => self.record_timer(name, elapsed_ms, tags),
            Err(_) => self.record_timer(name, elapsed_ms, tags.with("error", "true")),
        }
        result
    }

    /// Synchronous counterpart of [`MetricsCollector::time_async`].
    pub fn time_sync<T, E, F>(&self, name: &str, tags: Tags, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let start = Instant::now();
        let result = operation();
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(_) => self.record_timer(name, elapsed_ms, tags),
            Err(_) => self.record_timer(name, elapsed_ms, tags.with("error", "true")),
        }
        result
    }

    // ── Reading ────────────────────────────────────────────────────────

    /// Running total for a counter key, 0 when absent.
    pub fn counter(&self, name: &str, tags: Tags) -> f64 {
        self.counters
            .get(&MetricKey::new(name, tags))
            .map(|v| *v)
            .unwrap_or(0.0)
    }

    /// Last-known value for a gauge key, 0 when absent.
    pub fn gauge(&self, name: &str, tags: Tags) -> f64 {
        self.gauges
            .get(&MetricKey::new(name, tags))
            .map(|v| *v)
            .unwrap_or(0.0)
    }

    /// Aggregate statistics over the retained samples of one timer key.
    ///
    /// Percentiles use index `ceil(count * p) - 1` over ascending samples.
    pub fn timer_distribution(&self, name: &str, tags: Tags) -> Option<DistributionSummary> {
        let key = MetricKey::new(name, tags.clone());
        let samples = self.timers.get(&key)?;
        if samples.is_empty() {
            return None;
        }

        let mut sorted: Vec<f64> = samples.iter().copied().collect();
        drop(samples);
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        Some(DistributionSummary {
            name: name.to_string(),
            tags,
            count,
            sum,
            min: sorted[0],
            max: sorted[count - 1],
            mean: sum / count as f64,
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        })
    }

    /// Every metric family, keyed by rendered `(name, tag-set)` identity.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self
            .counters
            .iter()
            .map(|e| (render_key(&e.key().name, &e.key().tags), *e.value()))
            .collect();
        let gauges = self
            .gauges
            .iter()
            .map(|e| (render_key(&e.key().name, &e.key().tags), *e.value()))
            .collect();
        let timer_keys: Vec<MetricKey> = self.timers.iter().map(|e| e.key().clone()).collect();
        let timers = timer_keys
            .into_iter()
            .filter_map(|key| {
                let rendered = render_key(&key.name, &key.tags);
                self.timer_distribution(&key.name, key.tags)
                    .map(|dist| (rendered, dist))
            })
            .collect();

        MetricsSnapshot {
            counters,
            gauges,
            timers,
        }
    }

    /// Most recent raw events, oldest first. `limit` takes the tail.
    pub fn history(&self, limit: Option<usize>) -> Vec<MetricEvent> {
        let history = self.history.lock();
        let skip = limit.map_or(0, |l| history.len().saturating_sub(l));
        history.iter().skip(skip).cloned().collect()
    }

    /// Raw events for one metric name, oldest first.
    pub fn history_for(&self, name: &str, limit: Option<usize>) -> Vec<MetricEvent> {
        let history = self.history.lock();
        let filtered: Vec<MetricEvent> = history
            .iter()
            .filter(|event| event.name == name)
            .cloned()
            .collect();
        let skip = limit.map_or(0, |l| filtered.len().saturating_sub(l));
        filtered.into_iter().skip(skip).collect()
    }

    // ── Clearing ───────────────────────────────────────────────────────

    /// Clear every metric family and the event history.
    pub fn reset(&self) {
        self.counters.clear();
        self.gauges.clear();
        self.timers.clear();
        self.history.lock().clear();
    }

    /// Clear one `(name, tags)` key across all three families.
    /// History is left untouched.
    pub fn reset_metric(&self, name: &str, tags: Tags) {
        let key = MetricKey::new(name, tags);
        self.counters.remove(&key);
        self.gauges.remove(&key);
        self.timers.remove(&key);
    }

    // ── Domain convenience wrappers ────────────────────────────────────

    /// Record one API call outcome and forward it to the sink.
    pub async fn record_api_call(&self, service: &str, success: bool, duration_ms: f64) {
        self.increment_counter(
            "api.calls",
            1.0,
            Tags::from([("service", service), ("success", bool_str(success))]),
        );
        self.record_timer("api.duration", duration_ms, Tags::from([("service", service)]));

        if let Some(sink) = self.ready_sink().await
            && let Err(e) = sink.track_api_call(service, duration_ms, success).await
        {
            debug!(error = %e, "telemetry sink forwarding skipped");
        }
    }

    /// Record one classified error and forward it to the sink.
    pub async fn record_error(&self, service: &str, error_type: &str) {
        self.increment_counter(
            "errors",
            1.0,
            Tags::from([("service", service), ("error_type", error_type)]),
        );

        if let Some(sink) = self.ready_sink().await
            && let Err(e) = sink
                .track_custom_event(
                    "Error",
                    json!({ "service": service, "error_type": error_type }),
                )
                .await
        {
            debug!(error = %e, "telemetry sink forwarding skipped");
        }
    }

    /// Record earnings from a source and forward them to the sink.
    pub async fn record_earnings(&self, amount: f64, source: &str) {
        let tags = Tags::from([("source", source)]);
        self.increment_counter("earnings.total", amount, tags.clone());
        self.set_gauge("earnings.latest", amount, tags);

        if let Some(sink) = self.ready_sink().await
            && let Err(e) = sink.track_earnings(amount, source).await
        {
            debug!(error = %e, "telemetry sink forwarding skipped");
        }
    }

    /// Record generated content pieces and forward them to the sink.
    pub async fn record_content_generated(&self, count: f64, content_type: &str) {
        self.increment_counter(
            "content.generated",
            count,
            Tags::from([("type", content_type)]),
        );

        if let Some(sink) = self.ready_sink().await
            && let Err(e) = sink.track_content_generation(count, content_type).await
        {
            debug!(error = %e, "telemetry sink forwarding skipped");
        }
    }

    /// Best-effort sink gate: `None` when no sink is injected or the sink
    /// reports itself not ready.
    async fn ready_sink(&self) -> Option<&dyn TelemetrySink> {
        let sink = self.sink.as_deref()?;
        if sink.is_ready().await { Some(sink) } else { None }
    }

    fn record_event(&self, name: &str, kind: MetricKind, value: f64, tags: Tags) {
        let mut history = self.history.lock();
        history.push_back(MetricEvent {
            name: name.to_string(),
            kind,
            value,
            timestamp_ms: epoch_ms(),
            tags,
        });
        while history.len() > self.history_capacity {
            history.pop_front();
        }
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    let index = ((sorted.len() as f64 * p).ceil() as usize).saturating_sub(1);
    sorted[index.min(sorted.len() - 1)]
}

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}
