//! Workflow Error Taxonomy
//!
//! `Clone` so the same error can be handed to an `on_error` callback and
//! still be returned to the caller of `execute_workflow`.

use thiserror::Error;

/// Errors surfaced by workflow registration and execution.
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    /// No workflow registered under this id.
    #[error("workflow '{0}' not found")]
    NotFound(String),

    /// A definition declared the same step id twice.
    #[error("workflow '{workflow_id}': duplicate step id '{step_id}'")]
    DuplicateStep { workflow_id: String, step_id: String },

    /// A step depends on an id that no step in the definition carries.
    #[error("workflow '{workflow_id}': step '{step_id}' depends on unknown step '{dependency}'")]
    UnknownDependency {
        workflow_id: String,
        step_id: String,
        dependency: String,
    },

    /// A step depends on one declared after it; steps must be listed in a
    /// topologically valid order.
    #[error(
        "workflow '{workflow_id}': step '{step_id}' depends on '{dependency}' which is declared later"
    )]
    DependencyOrder {
        workflow_id: String,
        step_id: String,
        dependency: String,
    },

    /// At execution time a declared dependency had not completed.
    #[error(
        "workflow '{workflow_id}': step '{step_id}' dependency '{dependency}' has not completed"
    )]
    DependencyNotSatisfied {
        workflow_id: String,
        step_id: String,
        dependency: String,
    },

    /// Every retry attempt for a step failed; carries the last underlying
    /// error rendered as a string.
    #[error(
        "workflow '{workflow_id}': step '{step_id}' failed after {attempts} attempts: {last_error}"
    )]
    StepExhausted {
        workflow_id: String,
        step_id: String,
        attempts: u32,
        last_error: String,
    },

    /// The orchestrator has been shut down and admits no new executions.
    #[error("workflow orchestrator is shutting down")]
    ShuttingDown,
}
