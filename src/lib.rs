//! # duet-resilience
//!
//! Resilience layer for AI-backed conversation prompts and short-text
//! sentiment analysis. The crate keeps a calling service correct and
//! available when the AI providers it depends on are slow, unreachable,
//! or erroring:
//!
//! - a per-service [`CircuitBreaker`](core::breaker::CircuitBreaker) with
//!   failure tracking and timed recovery,
//! - a [`HealthRegistry`](core::health::HealthRegistry) aggregating
//!   fleet-wide health over named breakers,
//! - a [`FallbackCoordinator`](core::fallback::FallbackCoordinator) walking
//!   a deterministic fallback chain (primary provider, secondary provider,
//!   static content bank, hard-coded default) with edit-distance
//!   near-duplicate rejection on bank content.
//!
//! Callers of `generate`/`analyze_sentiment` always receive a result,
//! never an error; the `source` tier on every result tells observers how
//! degraded the response is. Providers are consumed through the narrow
//! [`AiProvider`](core::fallback::AiProvider) capability trait and stay
//! fully outside this crate.
//!
//! ```rust,ignore
//! use duet_resilience::{FallbackCoordinator, HealthRegistry};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(HealthRegistry::new());
//! let coordinator = FallbackCoordinator::new(Arc::clone(&registry))?;
//! let prompt = coordinator.generate(&ctx, &history, &recent, &primary, &secondary, &bank);
//! registry.stop_all(); // cancel recovery timers on shutdown
//! ```

/// Core implementations: the circuit breaker state machine, the health
/// registry and the tiered fallback coordinator with its text utilities.
pub mod core;
/// Adapter for the `log` facade, with optional env_logger initialization.
pub mod logging;
// Utility functions shared across the crate.
pub mod utils;

// re-export preludes
pub use crate::core::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
