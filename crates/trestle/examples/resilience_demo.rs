//! Resilience Core Demo
//!
//! Builds a context, trips a circuit breaker against a flaky dependency,
//! runs a three-step content workflow with a rollback, and prints the
//! resulting health rollup.
//!
//! Run with: cargo run --example resilience_demo -p trestle

use std::io;
use std::time::Duration;

use serde_json::json;
use trestle::metrics::MonitoringDashboard;
use trestle::workflow::{WorkflowDefinition, WorkflowStep};
use trestle::{CircuitBreakerConfig, Context};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trestle=info".into()),
        )
        .init();

    let ctx = Context::new();

    // ── 1. Circuit breaker against a flaky dependency ──────────────────
    let breaker = ctx.circuit_breakers().get_with(
        "flaky-api",
        CircuitBreakerConfig::new()
            .with_failure_threshold(3)
            .with_reset_timeout(Duration::from_millis(200)),
    );

    for attempt in 0..4 {
        let result = breaker
            .execute_with_fallback(
                async { Err::<&str, _>(io::Error::other("connection refused")) },
                async { Ok("cached response") },
            )
            .await;
        let success = result.is_ok();
        println!("call {attempt}: {:?} (state: {})", result, breaker.state());
        ctx.metrics().record_api_call("flaky-api", success, 12.5).await;
    }

    // ── 2. A workflow with dependencies and rollback ───────────────────
    ctx.workflows()
        .register_workflow(
            WorkflowDefinition::new("content-pipeline", "Content Pipeline")
                .with_description("research a niche, enhance it, publish the result")
                .add_step(WorkflowStep::new("research", "Research", |ctx| async move {
                    let niche = ctx
                        .input()
                        .and_then(|v| v["niche"].as_str())
                        .unwrap_or("general");
                    println!("researching {niche}...");
                    Ok(json!({ "ideas": 42 }))
                }))
                .add_step(
                    WorkflowStep::new("enhance", "Enhance", |_ctx| async {
                        println!("enhancing...");
                        Ok(json!({ "enhanced": 42 }))
                    })
                    .depends_on(["research"])
                    .with_rollback(|_ctx| async {
                        println!("rolling back enhancement");
                        Ok(())
                    }),
                )
                .add_step(
                    WorkflowStep::new("publish", "Publish", |_ctx| async {
                        println!("publishing...");
                        Ok(json!({ "published": true }))
                    })
                    .depends_on(["enhance"]),
                )
                .on_complete(|results| async move {
                    println!("pipeline done, {} step results", results.len());
                }),
        )
        .expect("definition is valid");

    let execution = ctx
        .workflows()
        .execute_workflow("content-pipeline", Some(json!({ "niche": "espresso" })))
        .await
        .expect("workflow succeeds");
    println!(
        "execution {} finished: {} ({}%)",
        execution.id, execution.status, execution.progress
    );

    // ── 3. Health rollup ───────────────────────────────────────────────
    ctx.metrics().record_earnings(120.0, "demo").await;
    let health = MonitoringDashboard::system_health(ctx.metrics());
    println!(
        "health: success rate {:.1}%, error rate {:.1}%, mean latency {:.1}ms, earnings ${:.2}",
        health.api_success_rate,
        health.error_rate,
        health.average_api_latency_ms,
        health.total_earnings
    );

    ctx.shutdown();
}
