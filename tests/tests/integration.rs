//! End-to-end tests wiring the resilience core to mock telemetry sinks.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use serde_json::json;
use trestle::metrics::MonitoringDashboard;
use trestle::workflow::{WorkflowDefinition, WorkflowError, WorkflowStatus};
use trestle::{Context, Tags};
use trestle_testing::{
    FailingSink, NotReadySink, RecordingSink, SinkEvent, countdown_step, failing_step, ok_step,
};

#[tokio::test]
async fn test_domain_events_forward_to_sink() {
    let sink = Arc::new(RecordingSink::new());
    let ctx = Context::builder().with_sink(sink.clone()).build();

    ctx.metrics().record_earnings(42.5, "affiliate").await;
    ctx.metrics().record_api_call("openai", true, 120.0).await;
    ctx.metrics().record_error("openai", "rate_limit").await;
    ctx.metrics().record_content_generated(3.0, "article").await;

    let events = sink.events();
    assert_eq!(events.len(), 4);
    assert_eq!(
        events[0],
        SinkEvent::Earnings {
            amount: 42.5,
            source: "affiliate".to_string(),
        }
    );
    assert_eq!(
        events[1],
        SinkEvent::ApiCall {
            service: "openai".to_string(),
            duration_ms: 120.0,
            success: true,
        }
    );
    assert_eq!(
        events[2],
        SinkEvent::CustomEvent {
            name: "Error".to_string(),
            attributes: json!({ "service": "openai", "error_type": "rate_limit" }),
        }
    );
    assert_eq!(
        events[3],
        SinkEvent::ContentGeneration {
            count: 3.0,
            content_type: "article".to_string(),
        }
    );
}

#[tokio::test]
async fn test_failing_sink_never_surfaces() {
    let ctx = Context::builder().with_sink(Arc::new(FailingSink)).build();

    // Every delivery fails; metrics still record locally.
    ctx.metrics().record_earnings(10.0, "demo").await;
    ctx.metrics().record_api_call("svc", false, 5.0).await;

    assert_eq!(
        ctx.metrics()
            .counter("earnings.total", Tags::from([("source", "demo")])),
        10.0
    );
    assert_eq!(
        ctx.metrics().counter(
            "api.calls",
            Tags::from([("service", "svc"), ("success", "false")])
        ),
        1.0
    );
}

#[tokio::test]
async fn test_not_ready_sink_is_skipped() {
    // NotReadySink panics on any delivery attempt, so reaching the
    // assertions proves forwarding was gated on readiness.
    let ctx = Context::builder().with_sink(Arc::new(NotReadySink)).build();

    ctx.metrics().record_earnings(1.0, "demo").await;
    ctx.metrics().record_content_generated(1.0, "post").await;

    assert_eq!(
        ctx.metrics()
            .counter("content.generated", Tags::from([("type", "post")])),
        1.0
    );
}

#[tokio::test]
async fn test_workflow_retry_then_succeed() {
    let ctx = Context::new();
    let (step, attempts) = countdown_step("flaky", 2);

    ctx.workflows()
        .register_workflow(
            WorkflowDefinition::new("retrying", "Retrying")
                .add_step(ok_step("prepare"))
                .add_step(step.depends_on(["prepare"])),
        )
        .unwrap();

    let execution = ctx
        .workflows()
        .execute_workflow("retrying", None)
        .await
        .unwrap();

    assert_eq!(execution.status, WorkflowStatus::Completed);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(execution.results["flaky"], json!("recovered"));
}

#[tokio::test]
async fn test_workflow_failure_records_error_and_sink_event() {
    let sink = Arc::new(RecordingSink::new());
    let ctx = Context::builder().with_sink(sink.clone()).build();

    ctx.workflows()
        .register_workflow(
            WorkflowDefinition::new("doomed", "Doomed")
                .add_step(ok_step("setup"))
                .add_step(failing_step("broken", "disk full").depends_on(["setup"])),
        )
        .unwrap();

    let err = ctx
        .workflows()
        .execute_workflow("doomed", None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::StepExhausted { .. }));

    let executions = ctx.workflows().all_executions();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, WorkflowStatus::Failed);
    assert!(executions[0].errors["broken"].contains("disk full"));

    // Step and workflow outcomes land in the shared collector.
    assert_eq!(
        ctx.metrics()
            .counter("workflow.steps.failed", Tags::from([("step_id", "broken")])),
        1.0
    );
    assert_eq!(
        ctx.metrics()
            .counter("workflows.failed", Tags::from([("workflow_id", "doomed")])),
        1.0
    );
}

#[tokio::test]
async fn test_breaker_and_dashboard_round_trip() {
    let ctx = Context::new();
    let breaker = ctx.circuit_breakers().get("payments");

    for _ in 0..3 {
        let outcome = breaker
            .execute(async { Ok::<_, std::io::Error>("charged") })
            .await;
        ctx.metrics()
            .record_api_call("payments", outcome.is_ok(), 8.0)
            .await;
    }
    let outcome = breaker
        .execute(async { Err::<&str, _>(std::io::Error::other("declined")) })
        .await;
    ctx.metrics()
        .record_api_call("payments", outcome.is_ok(), 30.0)
        .await;

    let health = MonitoringDashboard::system_health(ctx.metrics());
    assert_eq!(health.api_success_rate, 75.0);
    assert_eq!(health.average_api_latency_ms, 13.5);

    let stats = breaker.stats();
    assert_eq!(stats.total_successes, 3);
    assert_eq!(stats.total_failures, 1);
}

#[tokio::test]
async fn test_shutdown_cancels_and_blocks_new_work() {
    let ctx = Context::new();
    ctx.workflows()
        .register_workflow(WorkflowDefinition::new("wf", "WF").add_step(ok_step("only")))
        .unwrap();

    ctx.shutdown();
    let result = ctx.workflows().execute_workflow("wf", None).await;
    assert!(matches!(result, Err(WorkflowError::ShuttingDown)));
}
