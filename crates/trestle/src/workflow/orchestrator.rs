//! Workflow Orchestrator
//!
//! Drives registered [`WorkflowDefinition`]s: sequential step execution
//! with retry and timeout, dependency checks, reverse-order rollback on
//! failure, and metric emission for every step and workflow outcome.
//!
//! Concurrency: steps within one execution run strictly sequentially.
//! Concurrent `execute_workflow` calls, for the same or different
//! workflow ids, each get their own [`WorkflowExecution`] record with no
//! cross-execution locking. Cancellation only flips a status flag; an
//! in-flight step finishes (or times out) on its own schedule and the
//! loop observes the flag before starting the next step.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::Value;
use tracing::{error, info, warn};

use super::error::WorkflowError;
use super::execution::{OrchestratorStats, WorkflowExecution, WorkflowStatus};
use super::step::{StepContext, WorkflowDefinition, WorkflowStep};
use crate::clock::epoch_ms;
use crate::metrics::{MetricsCollector, Tags};

/// Executes registered workflows and owns their execution records.
pub struct WorkflowOrchestrator {
    workflows: DashMap<String, Arc<WorkflowDefinition>>,
    executions: DashMap<String, WorkflowExecution>,
    metrics: Arc<MetricsCollector>,
    seq: AtomicU64,
    shutting_down: AtomicBool,
}

impl WorkflowOrchestrator {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            workflows: DashMap::new(),
            executions: DashMap::new(),
            metrics,
            seq: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Register a workflow definition, validating it first.
    ///
    /// Step ids must be unique and every dependency must name a step
    /// declared earlier in the list: declaration order is the execution
    /// contract, the engine does not solve a DAG. Re-registering an id
    /// replaces the previous definition.
    pub fn register_workflow(&self, definition: WorkflowDefinition) -> Result<(), WorkflowError> {
        validate_definition(&definition)?;
        info!(workflow = %definition.id, name = %definition.name, steps = definition.steps.len(), "workflow registered");
        self.workflows
            .insert(definition.id.clone(), Arc::new(definition));
        Ok(())
    }

    /// Execute a registered workflow, returning the final execution
    /// record on success and the causing error on failure.
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        input: Option<Value>,
    ) -> Result<WorkflowExecution, WorkflowError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(WorkflowError::ShuttingDown);
        }
        let definition = self
            .workflows
            .get(workflow_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))?;

        let execution_id = format!(
            "{}-{}-{}",
            workflow_id,
            epoch_ms(),
            self.seq.fetch_add(1, Ordering::SeqCst)
        );
        self.executions.insert(
            execution_id.clone(),
            WorkflowExecution::new(execution_id.clone(), workflow_id.to_string(), epoch_ms()),
        );
        self.metrics.increment_counter(
            "workflows.started",
            1.0,
            Tags::from([("workflow_id", workflow_id)]),
        );
        info!(workflow = %workflow_id, execution = %execution_id, "workflow started");

        let input = input.map(Arc::new);
        let total_steps = definition.steps.len();
        let mut completed: Vec<String> = Vec::new();

        for (index, step) in definition.steps.iter().enumerate() {
            // Observe cancellation between steps; never resurrect the record.
            if let Some(execution) = self.get_execution(&execution_id)
                && execution.status == WorkflowStatus::Cancelled
            {
                info!(execution = %execution_id, step = %step.id, "execution cancelled, stopping before next step");
                return Ok(execution);
            }

            // Defense in depth behind registration validation.
            if let Some(missing) = step
                .dependencies
                .iter()
                .find(|dep| !completed.contains(dep))
            {
                let error = WorkflowError::DependencyNotSatisfied {
                    workflow_id: workflow_id.to_string(),
                    step_id: step.id.clone(),
                    dependency: missing.clone(),
                };
                return Err(self
                    .fail_execution(&definition, &execution_id, step, &completed, &input, error)
                    .await);
            }

            self.update(&execution_id, |execution| {
                execution.current_step = Some(step.id.clone());
            });

            let ctx = StepContext::new(
                workflow_id.to_string(),
                execution_id.clone(),
                input.clone(),
            );
            match self.run_step(step, ctx).await {
                Ok(value) => {
                    completed.push(step.id.clone());
                    let progress = ((index + 1) as f64 / total_steps as f64) * 100.0;
                    self.update(&execution_id, |execution| {
                        execution.results.insert(step.id.clone(), value.clone());
                        execution.progress = progress;
                    });
                    self.metrics.increment_counter(
                        "workflow.steps.success",
                        1.0,
                        Tags::from([("step_id", step.id.as_str())]),
                    );
                }
                Err(last_error) => {
                    let error = WorkflowError::StepExhausted {
                        workflow_id: workflow_id.to_string(),
                        step_id: step.id.clone(),
                        attempts: step.retries.max(1),
                        last_error,
                    };
                    return Err(self
                        .fail_execution(&definition, &execution_id, step, &completed, &input, error)
                        .await);
                }
            }
        }

        let end = epoch_ms();
        let snapshot = self
            .update_and_snapshot(&execution_id, |execution| {
                execution.status = WorkflowStatus::Completed;
                execution.progress = 100.0;
                execution.current_step = None;
                execution.end_time_ms = Some(end);
            })
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))?;
        let workflow_tags = Tags::from([("workflow_id", workflow_id)]);
        self.metrics
            .increment_counter("workflows.completed", 1.0, workflow_tags.clone());
        self.metrics.record_timer(
            "workflow.duration",
            snapshot.duration_ms().unwrap_or(0) as f64,
            workflow_tags,
        );
        info!(workflow = %workflow_id, execution = %execution_id, "workflow completed");

        if let Some(on_complete) = &definition.on_complete {
            let ordered: Vec<Value> = completed
                .iter()
                .filter_map(|id| snapshot.results.get(id).cloned())
                .collect();
            on_complete(ordered).await;
        }

        Ok(snapshot)
    }

    /// Clone of one execution record, if it exists.
    pub fn get_execution(&self, execution_id: &str) -> Option<WorkflowExecution> {
        self.executions.get(execution_id).map(|e| e.clone())
    }

    /// Clones of every execution record.
    pub fn all_executions(&self) -> Vec<WorkflowExecution> {
        self.executions.iter().map(|e| e.value().clone()).collect()
    }

    /// Flip a `Running` execution to `Cancelled`.
    ///
    /// Returns `false` for unknown ids and terminal executions. Does not
    /// interrupt an in-flight step.
    pub fn cancel_execution(&self, execution_id: &str) -> bool {
        let Some(mut execution) = self.executions.get_mut(execution_id) else {
            return false;
        };
        if execution.status != WorkflowStatus::Running {
            return false;
        }
        execution.status = WorkflowStatus::Cancelled;
        execution.end_time_ms = Some(epoch_ms());
        drop(execution);

        info!(execution = %execution_id, "workflow execution cancelled");
        self.metrics.increment_counter(
            "workflows.cancelled",
            1.0,
            Tags::from([("execution_id", execution_id)]),
        );
        true
    }

    /// Aggregate stats over every execution seen so far.
    pub fn stats(&self) -> OrchestratorStats {
        let executions = self.all_executions();
        let durations: Vec<u64> = executions.iter().filter_map(|e| e.duration_ms()).collect();
        OrchestratorStats {
            total: executions.len(),
            running: executions
                .iter()
                .filter(|e| e.status == WorkflowStatus::Running)
                .count(),
            completed: executions
                .iter()
                .filter(|e| e.status == WorkflowStatus::Completed)
                .count(),
            failed: executions
                .iter()
                .filter(|e| e.status == WorkflowStatus::Failed)
                .count(),
            average_duration_ms: if durations.is_empty() {
                0.0
            } else {
                durations.iter().sum::<u64>() as f64 / durations.len() as f64
            },
        }
    }

    /// Stop admitting executions and cancel everything still running.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let running: Vec<String> = self
            .executions
            .iter()
            .filter(|e| e.status == WorkflowStatus::Running)
            .map(|e| e.key().clone())
            .collect();
        for id in running {
            self.cancel_execution(&id);
        }
        info!("workflow orchestrator shut down");
    }

    // ── Internals ──────────────────────────────────────────────────────

    /// One step's attempt loop: each attempt races the step timeout, the
    /// first success short-circuits, and exhaustion yields the last error
    /// rendered as a string. `retries` is a public field, so the budget is
    /// clamped to at least one attempt here as well as in the builder.
    async fn run_step(&self, step: &WorkflowStep, ctx: StepContext) -> Result<Value, String> {
        let attempts = step.retries.max(1);
        let mut last_error = String::new();
        for attempt in 0..attempts {
            match tokio::time::timeout(step.timeout, (step.execute)(ctx.clone())).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = format!("timed out after {:?}", step.timeout),
            }
            warn!(
                step = %step.id,
                attempt = attempt + 1,
                max_attempts = attempts,
                error = %last_error,
                "workflow step attempt failed"
            );
            if attempt + 1 < attempts {
                tokio::time::sleep(step.backoff.delay_for(attempt)).await;
            }
        }
        Err(last_error)
    }

    /// Shared failure path: record the step error, roll back completed
    /// steps in reverse completion order, mark the execution failed, and
    /// notify the definition's `on_error` callback.
    async fn fail_execution(
        &self,
        definition: &WorkflowDefinition,
        execution_id: &str,
        failed_step: &WorkflowStep,
        completed: &[String],
        input: &Option<Arc<Value>>,
        error: WorkflowError,
    ) -> WorkflowError {
        self.update(execution_id, |execution| {
            execution
                .errors
                .insert(failed_step.id.clone(), error.to_string());
        });
        self.metrics.increment_counter(
            "workflow.steps.failed",
            1.0,
            Tags::from([("step_id", failed_step.id.as_str())]),
        );

        self.rollback_completed(definition, execution_id, completed, input)
            .await;

        let end = epoch_ms();
        self.update(execution_id, |execution| {
            execution.status = WorkflowStatus::Failed;
            execution.end_time_ms = Some(end);
        });
        self.metrics.increment_counter(
            "workflows.failed",
            1.0,
            Tags::from([("workflow_id", definition.id.as_str())]),
        );
        error!(workflow = %definition.id, execution = %execution_id, error = %error, "workflow failed");

        if let Some(on_error) = &definition.on_error {
            on_error(error.clone()).await;
        }
        error
    }

    /// Invoke rollback closures for completed steps, newest first.
    /// Rollback failures are logged and swallowed; they never mask the
    /// original error and never halt rollback of earlier steps.
    async fn rollback_completed(
        &self,
        definition: &WorkflowDefinition,
        execution_id: &str,
        completed: &[String],
        input: &Option<Arc<Value>>,
    ) {
        for step_id in completed.iter().rev() {
            let Some(step) = definition.steps.iter().find(|s| &s.id == step_id) else {
                continue;
            };
            let Some(rollback) = &step.rollback else {
                continue;
            };
            let ctx = StepContext::new(
                definition.id.clone(),
                execution_id.to_string(),
                input.clone(),
            );
            match rollback(ctx).await {
                Ok(()) => info!(step = %step.id, "rolled back step"),
                Err(e) => error!(step = %step.id, error = %e, "rollback failed"),
            }
        }
    }

    fn update<F: FnOnce(&mut WorkflowExecution)>(&self, execution_id: &str, apply: F) {
        if let Some(mut execution) = self.executions.get_mut(execution_id) {
            apply(&mut execution);
        }
    }

    /// Like [`Self::update`], but returns the updated record. `None` only
    /// if the record is missing; registration at execution start prevents
    /// that, and records are never removed.
    fn update_and_snapshot<F: FnOnce(&mut WorkflowExecution)>(
        &self,
        execution_id: &str,
        apply: F,
    ) -> Option<WorkflowExecution> {
        let mut execution = self.executions.get_mut(execution_id)?;
        apply(&mut execution);
        Some(execution.clone())
    }
}

/// Registration-time validation: unique ids, known dependencies, and
/// dependencies declared before their dependents.
fn validate_definition(definition: &WorkflowDefinition) -> Result<(), WorkflowError> {
    let all_ids: Vec<&str> = definition.steps.iter().map(|s| s.id.as_str()).collect();
    let mut seen: Vec<&str> = Vec::with_capacity(all_ids.len());

    for step in &definition.steps {
        if seen.contains(&step.id.as_str()) {
            return Err(WorkflowError::DuplicateStep {
                workflow_id: definition.id.clone(),
                step_id: step.id.clone(),
            });
        }
        for dependency in &step.dependencies {
            if !all_ids.contains(&dependency.as_str()) {
                return Err(WorkflowError::UnknownDependency {
                    workflow_id: definition.id.clone(),
                    step_id: step.id.clone(),
                    dependency: dependency.clone(),
                });
            }
            if !seen.contains(&dependency.as_str()) {
                return Err(WorkflowError::DependencyOrder {
                    workflow_id: definition.id.clone(),
                    step_id: step.id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
        seen.push(&step.id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::step::{RetryBackoff, WorkflowStep};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
    use std::time::Duration;

    fn orchestrator() -> WorkflowOrchestrator {
        WorkflowOrchestrator::new(Arc::new(MetricsCollector::new()))
    }

    fn quick_step(id: &str) -> WorkflowStep {
        WorkflowStep::new(id, id, |_ctx| async { Ok(json!("ok")) })
            .with_retries(1)
            .with_timeout(Duration::from_millis(200))
    }

    fn failing_step(id: &str) -> WorkflowStep {
        WorkflowStep::new(id, id, |_ctx| async {
            Err::<Value, _>("deliberate failure".into())
        })
        .with_retries(1)
        .with_timeout(Duration::from_millis(200))
        .with_backoff(RetryBackoff::Fixed(Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_registration_rejects_duplicate_ids() {
        let orch = orchestrator();
        let result = orch.register_workflow(
            WorkflowDefinition::new("wf", "WF")
                .add_step(quick_step("a"))
                .add_step(quick_step("a")),
        );
        assert!(matches!(result, Err(WorkflowError::DuplicateStep { .. })));
    }

    #[tokio::test]
    async fn test_registration_rejects_unknown_dependency() {
        let orch = orchestrator();
        let result = orch.register_workflow(
            WorkflowDefinition::new("wf", "WF").add_step(quick_step("a").depends_on(["ghost"])),
        );
        assert!(matches!(
            result,
            Err(WorkflowError::UnknownDependency { .. })
        ));
    }

    #[tokio::test]
    async fn test_registration_rejects_forward_dependency() {
        let orch = orchestrator();
        let result = orch.register_workflow(
            WorkflowDefinition::new("wf", "WF")
                .add_step(quick_step("a").depends_on(["b"]))
                .add_step(quick_step("b")),
        );
        assert!(matches!(result, Err(WorkflowError::DependencyOrder { .. })));
    }

    #[tokio::test]
    async fn test_execute_unknown_workflow() {
        let orch = orchestrator();
        let result = orch.execute_workflow("ghost", None).await;
        assert!(matches!(result, Err(WorkflowError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_successful_workflow_runs_all_steps() {
        let orch = orchestrator();
        orch.register_workflow(
            WorkflowDefinition::new("wf", "WF")
                .add_step(quick_step("a"))
                .add_step(quick_step("b").depends_on(["a"])),
        )
        .unwrap();

        let execution = orch.execute_workflow("wf", None).await.unwrap();
        assert_eq!(execution.status, WorkflowStatus::Completed);
        assert_eq!(execution.progress, 100.0);
        assert!(execution.end_time_ms.is_some());
        assert!(execution.results.contains_key("a"));
        assert!(execution.results.contains_key("b"));
        assert!(execution.errors.is_empty());
    }

    #[tokio::test]
    async fn test_step_failure_rolls_back_completed_steps_once() {
        let rollbacks = Arc::new(AtomicU32::new(0));
        let counter = rollbacks.clone();

        let orch = orchestrator();
        orch.register_workflow(
            WorkflowDefinition::new("wf", "WF")
                .add_step(quick_step("a").with_rollback(move |_ctx| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, AtomicOrdering::SeqCst);
                        Ok(())
                    }
                }))
                .add_step(failing_step("b").depends_on(["a"])),
        )
        .unwrap();

        let result = orch.execute_workflow("wf", None).await;
        assert!(matches!(result, Err(WorkflowError::StepExhausted { .. })));
        assert_eq!(rollbacks.load(AtomicOrdering::SeqCst), 1);

        let execution = &orch.all_executions()[0];
        assert_eq!(execution.status, WorkflowStatus::Failed);
        assert!(execution.results.contains_key("a"));
        assert!(!execution.results.contains_key("b"));
        assert!(execution.errors.contains_key("b"));
    }

    #[tokio::test]
    async fn test_first_step_failure_rolls_back_nothing() {
        let rollbacks = Arc::new(AtomicU32::new(0));
        let counter = rollbacks.clone();

        let orch = orchestrator();
        orch.register_workflow(
            WorkflowDefinition::new("wf", "WF")
                .add_step(failing_step("a").with_rollback(move |_ctx| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, AtomicOrdering::SeqCst);
                        Ok(())
                    }
                }))
                .add_step(quick_step("b")),
        )
        .unwrap();

        let result = orch.execute_workflow("wf", None).await;
        assert!(result.is_err());
        // Step "a" never completed, so its rollback must not run.
        assert_eq!(rollbacks.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(orch.all_executions()[0].status, WorkflowStatus::Failed);
    }

    #[tokio::test]
    async fn test_rollback_failure_does_not_mask_step_error() {
        let orch = orchestrator();
        orch.register_workflow(
            WorkflowDefinition::new("wf", "WF")
                .add_step(
                    quick_step("a")
                        .with_rollback(|_ctx| async { Err("rollback broke too".into()) }),
                )
                .add_step(failing_step("b").depends_on(["a"])),
        )
        .unwrap();

        let error = orch.execute_workflow("wf", None).await.unwrap_err();
        match error {
            WorkflowError::StepExhausted { step_id, .. } => assert_eq!(step_id, "b"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_retry_until_success_counts_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let orch = orchestrator();
        orch.register_workflow(WorkflowDefinition::new("wf", "WF").add_step(
            WorkflowStep::new("flaky", "Flaky", move |_ctx| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, AtomicOrdering::SeqCst) < 2 {
                        Err("transient".into())
                    } else {
                        Ok(json!("recovered"))
                    }
                }
            })
            .with_retries(3)
            .with_backoff(RetryBackoff::Fixed(Duration::from_millis(1))),
        ))
        .unwrap();

        let execution = orch.execute_workflow("wf", None).await.unwrap();
        assert_eq!(execution.status, WorkflowStatus::Completed);
        assert_eq!(attempts.load(AtomicOrdering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_retry_budget_still_runs_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        // Set the field directly, sidestepping the with_retries clamp.
        let mut step = WorkflowStep::new("a", "A", move |_ctx| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
                Err::<Value, _>("boom".into())
            }
        });
        step.retries = 0;

        let orch = orchestrator();
        orch.register_workflow(WorkflowDefinition::new("wf", "WF").add_step(step))
            .unwrap();

        let error = orch.execute_workflow("wf", None).await.unwrap_err();
        match error {
            WorkflowError::StepExhausted {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 1);
                assert_eq!(last_error, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_step_timeout_exhausts_attempts() {
        let orch = orchestrator();
        orch.register_workflow(WorkflowDefinition::new("wf", "WF").add_step(
            WorkflowStep::new("slow", "Slow", |_ctx| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(json!("never"))
            })
            .with_retries(2)
            .with_timeout(Duration::from_millis(20))
            .with_backoff(RetryBackoff::Fixed(Duration::from_millis(1))),
        ))
        .unwrap();

        let error = orch.execute_workflow("wf", None).await.unwrap_err();
        match error {
            WorkflowError::StepExhausted {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("timed out"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_on_complete_receives_ordered_results() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();

        let orch = orchestrator();
        orch.register_workflow(
            WorkflowDefinition::new("wf", "WF")
                .add_step(WorkflowStep::new("a", "A", |_ctx| async { Ok(json!(1)) }))
                .add_step(WorkflowStep::new("b", "B", |_ctx| async { Ok(json!(2)) }))
                .on_complete(move |results| {
                    let sink = sink.clone();
                    async move {
                        *sink.lock() = results;
                    }
                }),
        )
        .unwrap();

        orch.execute_workflow("wf", None).await.unwrap();
        assert_eq!(*seen.lock(), vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_on_error_observes_causing_error() {
        let observed = Arc::new(parking_lot::Mutex::new(None));
        let sink = observed.clone();

        let orch = orchestrator();
        orch.register_workflow(
            WorkflowDefinition::new("wf", "WF")
                .add_step(failing_step("a"))
                .on_error(move |error| {
                    let sink = sink.clone();
                    async move {
                        *sink.lock() = Some(error);
                    }
                }),
        )
        .unwrap();

        let returned = orch.execute_workflow("wf", None).await.unwrap_err();
        let observed = observed.lock().clone().unwrap();
        assert_eq!(observed.to_string(), returned.to_string());
    }

    #[tokio::test]
    async fn test_cancel_only_affects_running() {
        let orch = orchestrator();
        orch.register_workflow(WorkflowDefinition::new("wf", "WF").add_step(quick_step("a")))
            .unwrap();

        let execution = orch.execute_workflow("wf", None).await.unwrap();
        // Terminal execution: cancel is a no-op.
        assert!(!orch.cancel_execution(&execution.id));
        assert_eq!(
            orch.get_execution(&execution.id).unwrap().status,
            WorkflowStatus::Completed
        );
        assert!(!orch.cancel_execution("missing"));
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_step() {
        let orch = Arc::new(orchestrator());
        let step_b_ran = Arc::new(AtomicU32::new(0));
        let ran = step_b_ran.clone();

        let orch_for_step = orch.clone();
        orch.register_workflow(
            WorkflowDefinition::new("wf", "WF")
                .add_step(WorkflowStep::new("a", "A", move |ctx: StepContext| {
                    let orch = orch_for_step.clone();
                    async move {
                        // Cancel our own execution while the step runs.
                        orch.cancel_execution(&ctx.execution_id);
                        Ok(json!("done"))
                    }
                }))
                .add_step(WorkflowStep::new("b", "B", move |_ctx| {
                    let ran = ran.clone();
                    async move {
                        ran.fetch_add(1, AtomicOrdering::SeqCst);
                        Ok(json!("should not run"))
                    }
                })),
        )
        .unwrap();

        let execution = orch.execute_workflow("wf", None).await.unwrap();
        assert_eq!(execution.status, WorkflowStatus::Cancelled);
        assert_eq!(step_b_ran.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stats_aggregate() {
        let orch = orchestrator();
        orch.register_workflow(WorkflowDefinition::new("good", "Good").add_step(quick_step("a")))
            .unwrap();
        orch.register_workflow(WorkflowDefinition::new("bad", "Bad").add_step(failing_step("a")))
            .unwrap();

        orch.execute_workflow("good", None).await.unwrap();
        orch.execute_workflow("good", None).await.unwrap();
        let _ = orch.execute_workflow("bad", None).await;

        let stats = orch.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.running, 0);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_executions() {
        let orch = orchestrator();
        orch.register_workflow(WorkflowDefinition::new("wf", "WF").add_step(quick_step("a")))
            .unwrap();
        orch.shutdown();

        let result = orch.execute_workflow("wf", None).await;
        assert!(matches!(result, Err(WorkflowError::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_input_flows_to_steps() {
        let orch = orchestrator();
        orch.register_workflow(WorkflowDefinition::new("wf", "WF").add_step(
            WorkflowStep::new("echo", "Echo", |ctx: StepContext| async move {
                Ok(ctx.input().cloned().unwrap_or(Value::Null))
            }),
        ))
        .unwrap();

        let execution = orch
            .execute_workflow("wf", Some(json!({ "niche": "espresso" })))
            .await
            .unwrap();
        assert_eq!(execution.results["echo"]["niche"], "espresso");
    }
}
