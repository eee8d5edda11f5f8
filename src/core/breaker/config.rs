use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `BreakerConfig` encompasses the construction-time knobs of a single
/// circuit breaker. Invalid values are rejected at construction, not at
/// call time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// `failure_threshold` is the failure budget: once `failure_count`
    /// reaches it, the circuit opens.
    pub failure_threshold: u32,
    /// `recovery_timeout_ms` represents the minimum dwell (in milliseconds)
    /// in `Open` before a probe is allowed. During that period no requests
    /// are admitted; afterwards the breaker transforms to half-open for a
    /// trial request.
    pub recovery_timeout_ms: u64,
    /// `monitoring_period_ms` is the sampling period reported alongside
    /// status snapshots. Informational only, it does not alter control flow.
    pub monitoring_period_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            failure_threshold: 5,
            recovery_timeout_ms: 60_000,
            monitoring_period_ms: 10_000,
        }
    }
}

impl BreakerConfig {
    pub fn is_valid(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(Error::msg("invalid failure_threshold"));
        }
        if self.recovery_timeout_ms == 0 {
            return Err(Error::msg("invalid recovery_timeout_ms"));
        }
        Ok(())
    }
}

impl fmt::Display for BreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_valid() {
        let configs = vec![
            BreakerConfig::default(),
            BreakerConfig {
                failure_threshold: 1,
                recovery_timeout_ms: 1,
                monitoring_period_ms: 0,
            },
        ];
        for config in configs {
            assert!(config.is_valid().is_ok());
        }
    }

    #[test]
    #[should_panic(expected = "invalid failure_threshold")]
    fn illegal_threshold() {
        let config = BreakerConfig {
            failure_threshold: 0,
            ..Default::default()
        };
        config.is_valid().unwrap();
    }

    #[test]
    #[should_panic(expected = "invalid recovery_timeout_ms")]
    fn illegal_timeout() {
        let config = BreakerConfig {
            recovery_timeout_ms: 0,
            ..Default::default()
        };
        config.is_valid().unwrap();
    }
}
