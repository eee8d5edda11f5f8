//! Registry of named circuit breakers.
//!
//! One `HealthRegistry` is constructed at the composition root and passed by
//! reference into the fallback coordinator and provider wrappers. Breakers
//! are keyed by service name; the first registration for a name wins and
//! later registrations hand back the existing instance.

use crate::core::breaker::{BreakerConfig, BreakerStatus, CircuitBreaker};
use crate::{utils, Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
pub struct HealthRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl HealthRegistry {
    pub fn new() -> HealthRegistry {
        HealthRegistry::default()
    }

    /// `register` creates the breaker for `name` on first call and starts
    /// its auto-recovery poller. Idempotent: subsequent calls return the
    /// existing instance and ignore `config`. Invalid configs fail fast.
    pub fn register(&self, name: &str, config: BreakerConfig) -> Result<Arc<CircuitBreaker>> {
        if let Some(existing) = self.breakers.read().unwrap().get(name) {
            return Ok(Arc::clone(existing));
        }
        let mut breakers = self.breakers.write().unwrap();
        // a concurrent writer may have registered the name in between
        if let Some(existing) = breakers.get(name) {
            return Ok(Arc::clone(existing));
        }
        let breaker = Arc::new(CircuitBreaker::new(name, config)?);
        Arc::clone(&breaker).start_auto_recovery();
        breakers.insert(name.into(), Arc::clone(&breaker));
        Ok(breaker)
    }

    /// `get` returns the breaker registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().unwrap().get(name).map(Arc::clone)
    }

    /// `mark_success` delegates to the named breaker; no-op when `name` is
    /// unregistered.
    pub fn mark_success(&self, name: &str) {
        if let Some(breaker) = self.get(name) {
            breaker.mark_success();
        }
    }

    /// `mark_failure` delegates to the named breaker; no-op when `name` is
    /// unregistered.
    pub fn mark_failure(&self, name: &str, err: &Error) {
        if let Some(breaker) = self.get(name) {
            breaker.mark_failure(err);
        }
    }

    /// `is_healthy` returns `false` for unregistered names; otherwise the
    /// breaker's own judgement (which may admit a half-open probe).
    pub fn is_healthy(&self, name: &str) -> bool {
        self.get(name).map_or(false, |breaker| breaker.is_healthy())
    }

    /// `all_status` returns a snapshot per registered service.
    pub fn all_status(&self) -> HashMap<String, BreakerStatus> {
        let breakers = self.breakers.read().unwrap();
        breakers
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.status()))
            .collect()
    }

    /// `overall_health` aggregates the fleet: the healthy share as a
    /// formatted percentage, the per-service snapshot map and a timestamp.
    /// An empty registry reports `"100.00%"`.
    pub fn overall_health(&self) -> OverallHealth {
        let services = self.all_status();
        let total = services.len();
        let healthy = services.values().filter(|status| status.healthy).count();
        let overall = if total == 0 {
            "100.00%".into()
        } else {
            format!("{:.2}%", healthy as f64 / total as f64 * 100.0)
        };
        OverallHealth {
            overall,
            services,
            timestamp: utils::curr_time_millis(),
        }
    }

    /// `reset_all` forces every registered breaker back to `Closed`.
    pub fn reset_all(&self) {
        for breaker in self.breakers.read().unwrap().values() {
            breaker.reset();
        }
    }

    /// `stop_all` cancels every breaker's auto-recovery poller. Called at
    /// process shutdown and test teardown so no background work leaks.
    pub fn stop_all(&self) {
        for breaker in self.breakers.read().unwrap().values() {
            breaker.stop_auto_recovery();
        }
    }
}

/// Fleet-wide health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct OverallHealth {
    pub overall: String,
    pub services: HashMap<String, BreakerStatus>,
    pub timestamp: u64,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::breaker::State;

    fn config(threshold: u32) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: threshold,
            recovery_timeout_ms: 10_000,
            ..Default::default()
        }
    }

    #[test]
    fn register_first_wins() {
        let registry = HealthRegistry::new();
        let first = registry.register("svc", config(3)).unwrap();
        let second = registry.register("svc", config(99)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.config().failure_threshold, 3);
        registry.stop_all();
    }

    #[test]
    fn register_invalid_config_fails_fast() {
        let registry = HealthRegistry::new();
        let config = BreakerConfig {
            failure_threshold: 0,
            ..Default::default()
        };
        assert!(registry.register("svc", config).is_err());
        assert!(registry.get("svc").is_none());
    }

    #[test]
    fn unregistered_names() {
        let registry = HealthRegistry::new();
        assert!(!registry.is_healthy("ghost"));
        // delegation is a no-op rather than a panic
        registry.mark_success("ghost");
        registry.mark_failure("ghost", &Error::msg("refused"));
        assert!(registry.all_status().is_empty());
    }

    #[test]
    fn overall_health_aggregates() {
        let registry = HealthRegistry::new();
        registry.register("up", config(3)).unwrap();
        registry.register("down", config(1)).unwrap();
        registry.mark_failure("down", &Error::msg("refused"));
        let health = registry.overall_health();
        assert_eq!(health.overall, "50.00%");
        assert_eq!(health.services.len(), 2);
        assert!(health.services["up"].healthy);
        assert!(!health.services["down"].healthy);
        registry.stop_all();
    }

    #[test]
    fn overall_health_empty_registry() {
        let registry = HealthRegistry::new();
        let health = registry.overall_health();
        assert_eq!(health.overall, "100.00%");
        assert!(health.services.is_empty());
    }

    #[test]
    fn reset_all_closes_every_breaker() {
        let registry = HealthRegistry::new();
        registry.register("a", config(1)).unwrap();
        registry.register("b", config(1)).unwrap();
        registry.mark_failure("a", &Error::msg("refused"));
        registry.mark_failure("b", &Error::msg("refused"));
        registry.reset_all();
        for status in registry.all_status().values() {
            assert_eq!(status.state, State::Closed);
            assert_eq!(status.failure_count, 0);
        }
        registry.stop_all();
    }
}
