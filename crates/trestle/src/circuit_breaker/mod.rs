//! Circuit Breaker Pattern Implementation
//!
//! A configurable circuit breaker that isolates failures in a named
//! dependency so one misbehaving collaborator cannot cascade through the
//! process. It includes:
//! - The three-state machine (closed, open, half-open)
//! - A sliding failure window over a monitoring period
//! - Per-call timeout racing against the protected operation
//! - Transparent fallback execution when the circuit rejects or the
//!   operation fails
//! - A registry of lazily constructed named instances
//!
//! # State machine
//!
//! ```text
//!                 failure window reaches threshold
//!     +---------+ ------------------------------------> +--------+
//!     | CLOSED  |                                       |  OPEN  |
//!     +---------+ <----------------+                    +--------+
//!          ^                       |                        |
//!          |   success threshold   |     reset timeout      |
//!          |   consecutive         |     elapsed            |
//!          |   successes           |                        v
//!          |                  +-------------+  any failure
//!          +----------------- |  HALF-OPEN  | -----------> re-OPEN
//!                             +-------------+
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use trestle::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//!
//! let breaker = CircuitBreaker::new("llm-provider", CircuitBreakerConfig::default());
//!
//! let answer = breaker
//!     .execute_with_fallback(
//!         async { call_provider().await },
//!         async { Ok(cached_answer()) },
//!     )
//!     .await?;
//! ```
//!
//! Collaborators normally obtain breakers through the
//! [`CircuitBreakerRegistry`] rather than constructing them directly, so
//! that every caller naming the same dependency shares one failure window.

pub mod breaker;
pub mod config;
pub mod registry;

pub use breaker::{CircuitBreaker, CircuitBreakerError, CircuitBreakerStats, CircuitState};
pub use config::CircuitBreakerConfig;
pub use registry::CircuitBreakerRegistry;
