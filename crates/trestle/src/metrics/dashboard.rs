//! Monitoring Dashboard Rollup
//!
//! A read-only helper that condenses a [`MetricsCollector`] snapshot into
//! the handful of headline numbers an operations view wants: uptime,
//! earnings, content volume, API success/error rates, and mean latency.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::collector::MetricsCollector;

/// Headline system health numbers derived from one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub uptime: Duration,
    pub total_earnings: f64,
    pub content_generated: f64,
    /// Percentage of `api.calls` tagged `success="true"`; 100 when no
    /// calls have been recorded.
    pub api_success_rate: f64,
    /// Errors per API call, as a percentage; 0 when no calls recorded.
    pub error_rate: f64,
    /// Sample-weighted mean across all `api.duration` keys.
    pub average_api_latency_ms: f64,
}

/// Pure rollup over a collector; holds no state of its own.
pub struct MonitoringDashboard;

impl MonitoringDashboard {
    pub fn system_health(collector: &MetricsCollector) -> SystemHealth {
        let snapshot = collector.snapshot();

        let mut total_earnings = 0.0;
        let mut content_generated = 0.0;
        let mut api_calls = 0.0;
        let mut api_success = 0.0;
        let mut errors = 0.0;

        for (key, value) in &snapshot.counters {
            if key.starts_with("earnings.total") {
                total_earnings += value;
            } else if key.starts_with("content.generated") {
                content_generated += value;
            } else if key.starts_with("api.calls") {
                api_calls += value;
                if key.contains("success=\"true\"") {
                    api_success += value;
                }
            } else if key.starts_with("errors") {
                errors += value;
            }
        }

        let mut total_latency = 0.0;
        let mut latency_count = 0.0;
        for dist in snapshot.timers.values() {
            if dist.name == "api.duration" {
                total_latency += dist.mean * dist.count as f64;
                latency_count += dist.count as f64;
            }
        }

        SystemHealth {
            uptime: collector.uptime(),
            total_earnings,
            content_generated,
            api_success_rate: if api_calls > 0.0 {
                (api_success / api_calls) * 100.0
            } else {
                100.0
            },
            error_rate: if api_calls > 0.0 {
                (errors / api_calls) * 100.0
            } else {
                0.0
            },
            average_api_latency_ms: if latency_count > 0.0 {
                total_latency / latency_count
            } else {
                0.0
            },
        }
    }
}
