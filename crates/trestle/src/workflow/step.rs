//! Workflow Steps and Definitions
//!
//! A [`WorkflowStep`] is one named unit of work: an async execute closure,
//! an optional compensating rollback closure, a timeout, a retry budget
//! with backoff, and the ids of steps that must complete first. Steps are
//! assembled into a [`WorkflowDefinition`] via a builder chain.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use super::error::WorkflowError;

/// Error type produced by step execute/rollback closures.
pub type StepError = Box<dyn std::error::Error + Send + Sync>;

/// Result of one step execution: an arbitrary JSON payload on success.
pub type StepResult = Result<Value, StepError>;

type ExecuteFn = Arc<dyn Fn(StepContext) -> BoxFuture<'static, StepResult> + Send + Sync>;
type RollbackFn =
    Arc<dyn Fn(StepContext) -> BoxFuture<'static, Result<(), StepError>> + Send + Sync>;
type CompleteFn = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, ()> + Send + Sync>;
type ErrorFn = Arc<dyn Fn(WorkflowError) -> BoxFuture<'static, ()> + Send + Sync>;

const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_STEP_RETRIES: u32 = 3;

/// Delay strategy between retry attempts.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum RetryBackoff {
    /// Fixed delay between each retry.
    Fixed(Duration),
    /// Exponential backoff: delay doubles each attempt, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl RetryBackoff {
    /// Compute the delay for the given attempt number (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(d) => *d,
            Self::Exponential { base, max } => {
                let multiplier = 2u64.saturating_pow(attempt);
                let delay = base.saturating_mul(multiplier.min(u32::MAX as u64) as u32);
                delay.min(*max)
            }
        }
    }
}

impl Default for RetryBackoff {
    /// 1s, 2s, 4s, ... capped at 60s.
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

/// Data handed to every execute and rollback closure.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub workflow_id: String,
    pub execution_id: String,
    input: Option<Arc<Value>>,
}

impl StepContext {
    pub(crate) fn new(
        workflow_id: String,
        execution_id: String,
        input: Option<Arc<Value>>,
    ) -> Self {
        Self {
            workflow_id,
            execution_id,
            input,
        }
    }

    /// The optional input payload passed to `execute_workflow`.
    pub fn input(&self) -> Option<&Value> {
        self.input.as_deref()
    }
}

/// One named unit of work in a workflow.
#[derive(Clone)]
pub struct WorkflowStep {
    pub id: String,
    pub name: String,
    pub(crate) execute: ExecuteFn,
    pub(crate) rollback: Option<RollbackFn>,
    pub timeout: Duration,
    /// Total attempts, not extra retries.
    pub retries: u32,
    pub backoff: RetryBackoff,
    pub dependencies: Vec<String>,
}

impl WorkflowStep {
    /// Create a step from an async execute closure.
    pub fn new<F, Fut>(id: impl Into<String>, name: impl Into<String>, execute: F) -> Self
    where
        F: Fn(StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            execute: Arc::new(move |ctx| execute(ctx).boxed()),
            rollback: None,
            timeout: DEFAULT_STEP_TIMEOUT,
            retries: DEFAULT_STEP_RETRIES,
            backoff: RetryBackoff::default(),
            dependencies: Vec::new(),
        }
    }

    /// Attach a compensating rollback closure, invoked in reverse
    /// completion order if a later step fails.
    pub fn with_rollback<F, Fut>(mut self, rollback: F) -> Self
    where
        F: Fn(StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StepError>> + Send + 'static,
    {
        self.rollback = Some(Arc::new(move |ctx| rollback(ctx).boxed()));
        self
    }

    /// Per-attempt deadline (default 60s).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempt budget (default 3). Clamped to at least 1.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.max(1);
        self
    }

    /// Delay strategy between attempts (default exponential from 1s).
    pub fn with_backoff(mut self, backoff: RetryBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Declare step ids that must have completed before this step runs.
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }
}

impl fmt::Debug for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowStep")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("has_rollback", &self.rollback.is_some())
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// A declared workflow: ordered steps plus completion/error callbacks.
#[derive(Clone)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub steps: Vec<WorkflowStep>,
    pub(crate) on_complete: Option<CompleteFn>,
    pub(crate) on_error: Option<ErrorFn>,
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
            on_complete: None,
            on_error: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a step. Declaration order is execution order.
    pub fn add_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Callback invoked with step results in completion order after the
    /// whole workflow succeeds.
    pub fn on_complete<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_complete = Some(Arc::new(move |results| callback(results).boxed()));
        self
    }

    /// Callback invoked with the causing error after the workflow fails.
    pub fn on_error<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(WorkflowError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_error = Some(Arc::new(move |error| callback(error).boxed()));
        self
    }
}

impl fmt::Debug for WorkflowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("steps", &self.steps)
            .finish()
    }
}
