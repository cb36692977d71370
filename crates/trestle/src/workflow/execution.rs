//! Workflow Execution Records
//!
//! One [`WorkflowExecution`] exists per `execute_workflow` invocation.
//! Records are owned by the orchestrator's registry; callers only ever
//! receive clones, so nothing outside the orchestrator can mutate one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Pending => write!(f, "pending"),
            WorkflowStatus::Running => write!(f, "running"),
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::Failed => write!(f, "failed"),
            WorkflowStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// State of one workflow invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// `{workflow_id}-{epoch_ms}-{seq}`; seq disambiguates executions
    /// started within the same millisecond.
    pub id: String,
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub start_time_ms: u64,
    pub end_time_ms: Option<u64>,
    pub current_step: Option<String>,
    /// Step id to step result, for steps that completed.
    pub results: HashMap<String, Value>,
    /// Step id to rendered error, for steps that failed.
    pub errors: HashMap<String, String>,
    /// 0-100, non-decreasing while running.
    pub progress: f64,
}

impl WorkflowExecution {
    pub(crate) fn new(id: String, workflow_id: String, start_time_ms: u64) -> Self {
        Self {
            id,
            workflow_id,
            status: WorkflowStatus::Running,
            start_time_ms,
            end_time_ms: None,
            current_step: None,
            results: HashMap::new(),
            errors: HashMap::new(),
            progress: 0.0,
        }
    }

    /// Duration in milliseconds, once the execution has ended.
    pub fn duration_ms(&self) -> Option<u64> {
        self.end_time_ms
            .map(|end| end.saturating_sub(self.start_time_ms))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }
}

/// Aggregate numbers over every execution the orchestrator has seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub total: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    /// Mean duration over executions that have ended, 0 when none have.
    pub average_duration_ms: f64,
}
