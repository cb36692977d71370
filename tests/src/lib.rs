//! Trestle Testing Utilities
//!
//! Mock telemetry sinks and step helpers for exercising the resilience
//! core without live downstream services.

pub mod sink;
pub mod steps;

pub use sink::{FailingSink, NotReadySink, RecordingSink, SinkEvent};
pub use steps::{countdown_step, failing_step, ok_step};
