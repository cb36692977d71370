//! Named Circuit Breaker Registry
//!
//! The registry is the sole normal way collaborators obtain a breaker:
//! calling code names the dependency, the registry lazily constructs the
//! breaker on first use and every later caller shares the same instance
//! (and therefore the same failure window).

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::breaker::{CircuitBreaker, CircuitBreakerStats};
use super::config::CircuitBreakerConfig;

/// Process-wide cache of named [`CircuitBreaker`] instances.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    default_config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    /// Create a registry whose breakers default to `default_config`.
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            breakers: DashMap::new(),
        }
    }

    /// Get the breaker for a dependency, creating it with the registry's
    /// default config on first use.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_with(name, self.default_config.clone())
    }

    /// Get the breaker for a dependency, creating it with `config` on
    /// first use. The config applies only at creation; later calls return
    /// the existing instance unchanged.
    pub fn get_with(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(breaker = name, "creating circuit breaker");
                Arc::new(CircuitBreaker::new(name, config))
            })
            .clone()
    }

    /// All registered breakers by name.
    pub fn all(&self) -> HashMap<String, Arc<CircuitBreaker>> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Stats snapshots for all registered breakers.
    pub fn all_stats(&self) -> HashMap<String, CircuitBreakerStats> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect()
    }

    /// Reset one breaker; returns `false` if the name is unknown.
    pub fn reset(&self, name: &str) -> bool {
        match self.breakers.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Reset every registered breaker.
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
