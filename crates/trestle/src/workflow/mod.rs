//! Multi-step Workflow Orchestration
//!
//! Executes registered workflows as an ordered sequence of named steps:
//! - per-step timeout and retry with backoff
//! - declaration-order dependency validation (validated at registration,
//!   re-checked at execution; the engine does not reorder or parallelize)
//! - reverse-order rollback of completed steps when a later step fails
//! - per-execution progress and result/error maps
//! - step and workflow outcomes reported into the metrics collector
//!
//! # Usage
//!
//! ```rust,ignore
//! use trestle::workflow::{WorkflowDefinition, WorkflowStep, WorkflowOrchestrator};
//! use serde_json::json;
//!
//! let definition = WorkflowDefinition::new("publish", "Publish Article")
//!     .add_step(WorkflowStep::new("render", "Render", |_ctx| async {
//!         Ok(json!({ "pages": 3 }))
//!     }))
//!     .add_step(
//!         WorkflowStep::new("upload", "Upload", |_ctx| async {
//!             Ok(json!({ "url": "https://example.com" }))
//!         })
//!         .depends_on(["render"])
//!         .with_rollback(|_ctx| async { Ok(()) }),
//!     );
//!
//! orchestrator.register_workflow(definition)?;
//! let execution = orchestrator.execute_workflow("publish", None).await?;
//! ```

pub mod error;
pub mod execution;
pub mod orchestrator;
pub mod step;

pub use error::WorkflowError;
pub use execution::{OrchestratorStats, WorkflowExecution, WorkflowStatus};
pub use orchestrator::WorkflowOrchestrator;
pub use step::{
    RetryBackoff, StepContext, StepError, StepResult, WorkflowDefinition, WorkflowStep,
};
