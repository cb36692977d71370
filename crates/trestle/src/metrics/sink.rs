//! Telemetry Sink Interface
//!
//! An optional downstream the collector forwards domain events to. The
//! sink is injected at construction and treated as best-effort: a missing,
//! not-ready, or failing sink never surfaces an error to callers of the
//! `record_*` convenience methods.

use async_trait::async_trait;
use thiserror::Error;

/// A sink-side failure. Always caught and logged by the collector,
/// never propagated.
#[derive(Debug, Error)]
#[error("telemetry sink error: {0}")]
pub struct SinkError(pub String);

impl From<String> for SinkError {
    fn from(msg: String) -> Self {
        Self(msg)
    }
}

impl From<&str> for SinkError {
    fn from(msg: &str) -> Self {
        Self(msg.to_string())
    }
}

/// External telemetry destination for domain events.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Whether the sink can currently accept events. Forwarding is
    /// skipped while this returns `false`.
    async fn is_ready(&self) -> bool;

    async fn track_earnings(&self, amount: f64, source: &str) -> Result<(), SinkError>;

    async fn track_content_generation(
        &self,
        count: f64,
        content_type: &str,
    ) -> Result<(), SinkError>;

    async fn track_api_call(
        &self,
        service: &str,
        duration_ms: f64,
        success: bool,
    ) -> Result<(), SinkError>;

    async fn track_custom_event(
        &self,
        name: &str,
        attributes: serde_json::Value,
    ) -> Result<(), SinkError>;
}
