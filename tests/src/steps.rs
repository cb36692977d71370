//! Prefabricated workflow steps for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::json;
use trestle::{RetryBackoff, WorkflowStep};

/// A step that succeeds immediately with `{"step": id}`.
pub fn ok_step(id: &str) -> WorkflowStep {
    let payload = json!({ "step": id });
    WorkflowStep::new(id, id, move |_ctx| {
        let payload = payload.clone();
        async move { Ok(payload) }
    })
    .with_retries(1)
    .with_timeout(Duration::from_millis(500))
}

/// A step that fails every attempt with a fixed message.
pub fn failing_step(id: &str, message: &str) -> WorkflowStep {
    let message = message.to_string();
    WorkflowStep::new(id, id, move |_ctx| {
        let message = message.clone();
        async move { Err(message.into()) }
    })
    .with_retries(1)
    .with_timeout(Duration::from_millis(500))
    .with_backoff(RetryBackoff::Fixed(Duration::from_millis(1)))
}

/// A step that fails until `failures` attempts have happened, then
/// succeeds. The shared counter exposes how many attempts ran.
pub fn countdown_step(id: &str, failures: u32) -> (WorkflowStep, Arc<AtomicU32>) {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    let step = WorkflowStep::new(id, id, move |_ctx| {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) < failures {
                Err("transient".into())
            } else {
                Ok(json!("recovered"))
            }
        }
    })
    .with_retries(failures + 1)
    .with_timeout(Duration::from_millis(500))
    .with_backoff(RetryBackoff::Fixed(Duration::from_millis(1)));
    (step, attempts)
}
