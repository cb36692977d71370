//! Circuit Breaker State Machine
//!
//! The breaker wraps caller-supplied async operations with a per-call
//! timeout and decides admission from a three-state machine:
//! - `Closed`: normal operation, calls pass through
//! - `Open`: calls are rejected until the reset timeout elapses
//! - `HalfOpen`: probation, a run of consecutive successes closes the
//!   circuit again and any failure re-opens it immediately
//!
//! All interior state sits behind one [`parking_lot::Mutex`] that is never
//! held across an `.await`, so outcome accounting is applied in
//! call-completion order and the breaker is safe to share across tasks.

use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::config::CircuitBreakerConfig;
use crate::clock::epoch_ms;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation - calls are allowed.
    Closed,
    /// Circuit is open - calls are rejected.
    Open,
    /// Testing recovery - calls are allowed on probation.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Errors surfaced by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E: std::error::Error + 'static> {
    /// The circuit is open and no fallback produced a value.
    #[error("circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    /// The operation exceeded the per-call deadline.
    #[error("circuit breaker '{name}': operation timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    /// The operation itself failed.
    #[error("circuit breaker '{name}': operation failed: {source}")]
    Operation {
        name: String,
        #[source]
        source: E,
    },
}

/// Read-only snapshot of a breaker's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    /// Length of the pruned failure window at snapshot time.
    pub windowed_failures: usize,
    pub last_failure_ms: Option<u64>,
    pub last_success_ms: Option<u64>,
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_timeouts: u64,
    pub total_rejected: u64,
}

/// Mutable interior owned exclusively by the breaker.
#[derive(Debug)]
struct Inner {
    state: CircuitState,
    /// When the circuit last entered `Open`; drives the half-open trial.
    opened_at: Option<Instant>,
    /// Timestamps of recent failures, pruned to the monitoring period.
    failure_window: VecDeque<Instant>,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_ms: Option<u64>,
    last_success_ms: Option<u64>,
    total_calls: u64,
    total_successes: u64,
    total_failures: u64,
    total_timeouts: u64,
    total_rejected: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            opened_at: None,
            failure_window: VecDeque::new(),
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_failure_ms: None,
            last_success_ms: None,
            total_calls: 0,
            total_successes: 0,
            total_failures: 0,
            total_timeouts: 0,
            total_rejected: 0,
        }
    }

    /// Drop window entries older than the monitoring period.
    fn prune_window(&mut self, period: Duration) {
        let now = Instant::now();
        while let Some(oldest) = self.failure_window.front() {
            if now.duration_since(*oldest) > period {
                self.failure_window.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Per-named-dependency failure isolator.
///
/// Obtain instances through
/// [`CircuitBreakerRegistry`](super::CircuitBreakerRegistry) so callers
/// naming the same dependency share one failure window.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker for a named dependency.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner::new()),
        }
    }

    /// The dependency name this breaker guards.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configuration fixed at construction.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, applying the open-to-half-open transition if the
    /// reset timeout has elapsed.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.check_reset_timeout(&mut inner);
        inner.state
    }

    /// Snapshot the breaker's counters.
    pub fn stats(&self) -> CircuitBreakerStats {
        let mut inner = self.inner.lock();
        self.check_reset_timeout(&mut inner);
        inner.prune_window(self.config.monitoring_period);
        CircuitBreakerStats {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            windowed_failures: inner.failure_window.len(),
            last_failure_ms: inner.last_failure_ms,
            last_success_ms: inner.last_success_ms,
            total_calls: inner.total_calls,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            total_timeouts: inner.total_timeouts,
            total_rejected: inner.total_rejected,
        }
    }

    /// Execute an operation under circuit breaker protection.
    ///
    /// The operation races the configured call timeout; the losing future
    /// is dropped, which cancels it. A timeout counts as a failure for the
    /// state machine and is separately tallied in `total_timeouts`.
    pub async fn execute<T, E, F>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        if !self.admit() {
            return Err(CircuitBreakerError::CircuitOpen {
                name: self.name.clone(),
            });
        }

        match tokio::time::timeout(self.config.call_timeout, operation).await {
            Ok(Ok(value)) => {
                self.on_success();
                Ok(value)
            }
            Ok(Err(e)) => {
                self.on_failure(false);
                Err(CircuitBreakerError::Operation {
                    name: self.name.clone(),
                    source: e,
                })
            }
            Err(_) => {
                self.on_failure(true);
                Err(CircuitBreakerError::Timeout {
                    name: self.name.clone(),
                    timeout: self.config.call_timeout,
                })
            }
        }
    }

    /// Execute with a fallback that runs when the circuit rejects the call
    /// or the operation fails.
    ///
    /// A fallback success is returned transparently. A fallback failure is
    /// swallowed and the original rejection/error surfaces instead, so the
    /// caller always sees the primary failure cause.
    pub async fn execute_with_fallback<T, E, F, FB>(
        &self,
        operation: F,
        fallback: FB,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
        FB: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        if !self.admit() {
            return match fallback.await {
                Ok(value) => Ok(value),
                Err(_) => Err(CircuitBreakerError::CircuitOpen {
                    name: self.name.clone(),
                }),
            };
        }

        let original = match tokio::time::timeout(self.config.call_timeout, operation).await {
            Ok(Ok(value)) => {
                self.on_success();
                return Ok(value);
            }
            Ok(Err(e)) => {
                self.on_failure(false);
                CircuitBreakerError::Operation {
                    name: self.name.clone(),
                    source: e,
                }
            }
            Err(_) => {
                self.on_failure(true);
                CircuitBreakerError::Timeout {
                    name: self.name.clone(),
                    timeout: self.config.call_timeout,
                }
            }
        };

        match fallback.await {
            Ok(value) => Ok(value),
            Err(_) => Err(original),
        }
    }

    /// Force the circuit open, rejecting all calls until reset.
    pub fn force_open(&self) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, CircuitState::Open);
    }

    /// Force the circuit closed regardless of recent failures.
    pub fn force_close(&self) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, CircuitState::Closed);
    }

    /// Return to `Closed` with every counter and the window zeroed.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let old = inner.state;
        *inner = Inner::new();
        if old != CircuitState::Closed {
            info!(breaker = %self.name, from = %old, to = %CircuitState::Closed, "circuit breaker reset");
        }
    }

    /// Admission check; counts a rejection when the circuit is open.
    fn admit(&self) -> bool {
        let mut inner = self.inner.lock();
        self.check_reset_timeout(&mut inner);
        if inner.state == CircuitState::Open {
            inner.total_rejected += 1;
            false
        } else {
            true
        }
    }

    /// Lazy `Open` -> `HalfOpen` edge: re-entering `Open` overwrites
    /// `opened_at`, which subsumes cancelling a previously scheduled
    /// transition.
    fn check_reset_timeout(&self, inner: &mut Inner) {
        if inner.state == CircuitState::Open
            && let Some(opened_at) = inner.opened_at
            && opened_at.elapsed() >= self.config.reset_timeout
        {
            self.transition(inner, CircuitState::HalfOpen);
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        inner.total_calls += 1;
        inner.total_successes += 1;
        inner.last_success_ms = Some(epoch_ms());
        inner.consecutive_successes += 1;
        inner.consecutive_failures = 0;

        if inner.state == CircuitState::HalfOpen
            && inner.consecutive_successes >= self.config.success_threshold
        {
            self.transition(&mut inner, CircuitState::Closed);
        }
    }

    fn on_failure(&self, timed_out: bool) {
        let mut inner = self.inner.lock();
        inner.total_calls += 1;
        inner.total_failures += 1;
        if timed_out {
            inner.total_timeouts += 1;
        }
        inner.last_failure_ms = Some(epoch_ms());
        inner.consecutive_failures += 1;
        inner.consecutive_successes = 0;

        inner.failure_window.push_back(Instant::now());
        inner.prune_window(self.config.monitoring_period);

        match inner.state {
            // A single failure during the half-open trial re-opens.
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Open),
            CircuitState::Closed => {
                if inner.failure_window.len() >= self.config.failure_threshold as usize {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;

        match to {
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
                warn!(breaker = %self.name, from = %from, to = %to, "circuit breaker opened");
            }
            CircuitState::HalfOpen => {
                inner.consecutive_failures = 0;
                inner.consecutive_successes = 0;
                info!(breaker = %self.name, from = %from, to = %to, "circuit breaker half-open trial");
            }
            CircuitState::Closed => {
                inner.opened_at = None;
                inner.failure_window.clear();
                inner.consecutive_failures = 0;
                info!(breaker = %self.name, from = %from, to = %to, "circuit breaker closed");
            }
        }
    }
}
