//! Composition Root
//!
//! A [`Context`] bundles one metrics collector, one circuit breaker
//! registry, and one workflow orchestrator with an explicit lifecycle.
//! There is no process-global state: create as many isolated contexts as
//! needed (one per test case, one per embedded subsystem) and drop them
//! when done.

use std::sync::Arc;

use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::metrics::{MetricsCollector, TelemetrySink};
use crate::workflow::WorkflowOrchestrator;

/// One isolated resilience-and-orchestration instance.
pub struct Context {
    metrics: Arc<MetricsCollector>,
    circuit_breakers: Arc<CircuitBreakerRegistry>,
    workflows: Arc<WorkflowOrchestrator>,
}

impl Context {
    /// Create a context with default settings and no telemetry sink.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn circuit_breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.circuit_breakers
    }

    pub fn workflows(&self) -> &Arc<WorkflowOrchestrator> {
        &self.workflows
    }

    /// Stop the orchestrator admitting executions and cancel everything
    /// still running. Breakers and metrics hold no background resources
    /// and need no teardown.
    pub fn shutdown(&self) {
        self.workflows.shutdown();
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`Context`].
#[derive(Default)]
pub struct ContextBuilder {
    sink: Option<Arc<dyn TelemetrySink>>,
    default_breaker_config: Option<CircuitBreakerConfig>,
    history_capacity: Option<usize>,
    timer_capacity: Option<usize>,
}

impl ContextBuilder {
    /// Telemetry sink the collector forwards domain events to.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Config applied to breakers the registry creates without an
    /// explicit one.
    pub fn with_default_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.default_breaker_config = Some(config);
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = Some(capacity);
        self
    }

    pub fn with_timer_capacity(mut self, capacity: usize) -> Self {
        self.timer_capacity = Some(capacity);
        self
    }

    pub fn build(self) -> Context {
        let mut metrics = MetricsCollector::builder();
        if let Some(sink) = self.sink {
            metrics = metrics.with_sink(sink);
        }
        if let Some(capacity) = self.history_capacity {
            metrics = metrics.with_history_capacity(capacity);
        }
        if let Some(capacity) = self.timer_capacity {
            metrics = metrics.with_timer_capacity(capacity);
        }
        let metrics = Arc::new(metrics.build());

        Context {
            circuit_breakers: Arc::new(CircuitBreakerRegistry::new(
                self.default_breaker_config.unwrap_or_default(),
            )),
            workflows: Arc::new(WorkflowOrchestrator::new(metrics.clone())),
            metrics,
        }
    }
}
