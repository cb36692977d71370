//! Trestle — in-process resilience and orchestration.
//!
//! A trestle carries load over unstable ground. This crate does the same for
//! code that depends on flaky collaborators: it bundles three cooperating
//! subsystems behind one composition root ([`Context`]):
//!
//! - [`circuit_breaker`] — per-named-dependency failure isolation with
//!   timeout racing, sliding failure-window tracking, and
//!   closed/open/half-open transitions, plus a process-wide
//!   [`CircuitBreakerRegistry`] for lazy named instances.
//! - [`metrics`] — counters, gauges, timer distributions with percentile
//!   summaries, bounded event history, and best-effort forwarding to an
//!   injected [`TelemetrySink`].
//! - [`workflow`] — sequential multi-step workflows with per-step timeout,
//!   retry with backoff, dependency validation, and reverse-order rollback
//!   of completed steps on failure.
//!
//! Trestle is a library surface only: no network transport, no persistence
//! across restarts, no exactly-once guarantees. Everything lives in process
//! memory and is safe to share across tasks and threads.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use trestle::{Context, CircuitBreakerConfig};
//!
//! let ctx = Context::new();
//! let breaker = ctx.circuit_breakers().get("payments-api");
//!
//! let reply = breaker
//!     .execute(async { call_payments_api().await })
//!     .await?;
//!
//! ctx.metrics().record_api_call("payments-api", true, 42.0).await;
//! ```

pub mod circuit_breaker;
pub mod context;
pub mod metrics;
pub mod workflow;

pub(crate) mod clock;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry,
    CircuitBreakerStats, CircuitState,
};
pub use context::{Context, ContextBuilder};
pub use metrics::{
    DistributionSummary, MetricEvent, MetricKind, MetricsCollector, MetricsCollectorBuilder,
    MetricsSnapshot, MonitoringDashboard, SinkError, SystemHealth, Tags, TelemetrySink,
};
pub use workflow::{
    OrchestratorStats, RetryBackoff, StepContext, StepError, WorkflowDefinition, WorkflowError,
    WorkflowExecution, WorkflowOrchestrator, WorkflowStatus, WorkflowStep,
};
