//! Metrics and Telemetry Module
//!
//! An in-process telemetry store in the Spectator mold: counters, gauges
//! and timer distributions identified by `(name, tag-set)`, a bounded
//! history of raw metric events, and best-effort forwarding of domain
//! events to an injected [`TelemetrySink`].
//!
//! Identity: tag-sets are canonically ordered, so `{a=1,b=2}` and
//! `{b=2,a=1}` address the same metric. The rendered form
//! (`name{k="v",...}`) is the key used in [`MetricsSnapshot`].

pub mod collector;
pub mod dashboard;
pub mod sink;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use collector::{MetricsCollector, MetricsCollectorBuilder, MetricsSnapshot};
pub use dashboard::{MonitoringDashboard, SystemHealth};
pub use sink::{SinkError, TelemetrySink};

/// A canonically-ordered set of key/value tags.
///
/// Backed by a `BTreeMap` so insertion order never affects identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// An empty tag-set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag, replacing any previous value for the key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Tags {
    fn from(pairs: [(K, V); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Render the identity key for a metric: `name` when untagged, otherwise
/// `name{k="v",...}` with tags in canonical order.
pub(crate) fn render_key(name: &str, tags: &Tags) -> String {
    if tags.is_empty() {
        return name.to_string();
    }
    let rendered: Vec<String> = tags
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v))
        .collect();
    format!("{}{{{}}}", name, rendered.join(","))
}

/// Interior map key for one metric family entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct MetricKey {
    pub(crate) name: String,
    pub(crate) tags: Tags,
}

impl MetricKey {
    pub(crate) fn new(name: &str, tags: Tags) -> Self {
        Self {
            name: name.to_string(),
            tags,
        }
    }
}

/// Which family a recorded event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Timer,
}

/// One raw recorded event, as retained in history.
///
/// For counters, `value` is the post-increment running total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEvent {
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
    pub timestamp_ms: u64,
    pub tags: Tags,
}

/// Aggregate statistics derived from one timer key's retained samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub name: String,
    pub tags: Tags,
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}
