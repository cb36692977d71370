//! Circuit Breaker Configuration
//!
//! Immutable per-breaker settings. A config is fixed at construction;
//! tuning an existing breaker means resetting and recreating it through
//! the registry.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a circuit breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of failures within the monitoring period before opening.
    pub failure_threshold: u32,
    /// Consecutive successes in half-open needed to close the circuit.
    pub success_threshold: u32,
    /// Per-call deadline raced against the protected operation.
    pub call_timeout: Duration,
    /// How long the circuit stays open before the half-open trial.
    pub reset_timeout: Duration,
    /// Sliding window over which failures are counted.
    pub monitoring_period: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            call_timeout: Duration::from_secs(10),
            reset_timeout: Duration::from_secs(30),
            monitoring_period: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the success threshold.
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Set the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the open-to-half-open delay.
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Set the failure-counting window.
    pub fn with_monitoring_period(mut self, period: Duration) -> Self {
        self.monitoring_period = period;
        self
    }

    /// A strict configuration (opens quickly, recovers cautiously).
    pub fn strict() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 5,
            call_timeout: Duration::from_secs(5),
            reset_timeout: Duration::from_secs(60),
            monitoring_period: Duration::from_secs(30),
        }
    }

    /// A lenient configuration (tolerates many failures before opening).
    pub fn lenient() -> Self {
        Self {
            failure_threshold: 10,
            success_threshold: 2,
            call_timeout: Duration::from_secs(30),
            reset_timeout: Duration::from_secs(15),
            monitoring_period: Duration::from_secs(120),
        }
    }
}
