//! Mock telemetry sinks.
//!
//! [`RecordingSink`] captures every forwarded event for assertions,
//! [`FailingSink`] rejects everything, and [`NotReadySink`] reports
//! itself unavailable — together covering the collector's best-effort
//! forwarding contract.

use async_trait::async_trait;
use parking_lot::Mutex;
use trestle::{SinkError, TelemetrySink};

/// One event a sink observed.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Earnings { amount: f64, source: String },
    ContentGeneration { count: f64, content_type: String },
    ApiCall {
        service: String,
        duration_ms: f64,
        success: bool,
    },
    CustomEvent {
        name: String,
        attributes: serde_json::Value,
    },
}

/// Sink that records every event it receives.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }

    fn record(&self, event: SinkEvent) {
        self.events.lock().push(event);
    }
}

#[async_trait]
impl TelemetrySink for RecordingSink {
    async fn is_ready(&self) -> bool {
        true
    }

    async fn track_earnings(&self, amount: f64, source: &str) -> Result<(), SinkError> {
        self.record(SinkEvent::Earnings {
            amount,
            source: source.to_string(),
        });
        Ok(())
    }

    async fn track_content_generation(
        &self,
        count: f64,
        content_type: &str,
    ) -> Result<(), SinkError> {
        self.record(SinkEvent::ContentGeneration {
            count,
            content_type: content_type.to_string(),
        });
        Ok(())
    }

    async fn track_api_call(
        &self,
        service: &str,
        duration_ms: f64,
        success: bool,
    ) -> Result<(), SinkError> {
        self.record(SinkEvent::ApiCall {
            service: service.to_string(),
            duration_ms,
            success,
        });
        Ok(())
    }

    async fn track_custom_event(
        &self,
        name: &str,
        attributes: serde_json::Value,
    ) -> Result<(), SinkError> {
        self.record(SinkEvent::CustomEvent {
            name: name.to_string(),
            attributes,
        });
        Ok(())
    }
}

/// Sink that is ready but fails every delivery.
#[derive(Default)]
pub struct FailingSink;

#[async_trait]
impl TelemetrySink for FailingSink {
    async fn is_ready(&self) -> bool {
        true
    }

    async fn track_earnings(&self, _amount: f64, _source: &str) -> Result<(), SinkError> {
        Err("delivery refused".into())
    }

    async fn track_content_generation(
        &self,
        _count: f64,
        _content_type: &str,
    ) -> Result<(), SinkError> {
        Err("delivery refused".into())
    }

    async fn track_api_call(
        &self,
        _service: &str,
        _duration_ms: f64,
        _success: bool,
    ) -> Result<(), SinkError> {
        Err("delivery refused".into())
    }

    async fn track_custom_event(
        &self,
        _name: &str,
        _attributes: serde_json::Value,
    ) -> Result<(), SinkError> {
        Err("delivery refused".into())
    }
}

/// Sink that never reports ready; deliveries would panic if attempted.
#[derive(Default)]
pub struct NotReadySink;

#[async_trait]
impl TelemetrySink for NotReadySink {
    async fn is_ready(&self) -> bool {
        false
    }

    async fn track_earnings(&self, _amount: f64, _source: &str) -> Result<(), SinkError> {
        panic!("forwarding must be skipped while not ready");
    }

    async fn track_content_generation(
        &self,
        _count: f64,
        _content_type: &str,
    ) -> Result<(), SinkError> {
        panic!("forwarding must be skipped while not ready");
    }

    async fn track_api_call(
        &self,
        _service: &str,
        _duration_ms: f64,
        _success: bool,
    ) -> Result<(), SinkError> {
        panic!("forwarding must be skipped while not ready");
    }

    async fn track_custom_event(
        &self,
        _name: &str,
        _attributes: serde_json::Value,
    ) -> Result<(), SinkError> {
        panic!("forwarding must be skipped while not ready");
    }
}
