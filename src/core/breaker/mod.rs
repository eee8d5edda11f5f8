//! Circuit Breaker State Machine:
//!
//!                          failure_count reaches threshold
//!
//!             +-----------------------------------------------------------------------+
//!             |                                                                       |
//!             |                                                                       v
//!     +----------------+                   +----------------+      Probe      +----------------+
//!     |                |                   |                |<----------------|                |
//!     |                |   Probe succeed   |                |                 |                |
//!     |     Closed     |<------------------|    HalfOpen    |                 |      Open      |
//!     |                |                   |                |   Probe failed  |                |
//!     |                |                   |                +---------------->|                |
//!     +----------------+                   +----------------+                 +----------------+
//!
//! The probe edge out of `Open` is taken after the recovery dwell elapses,
//! either by the next `is_healthy()` caller or by the auto-recovery timer.
//! Entering `HalfOpen` does not clear `failure_count`, so one failed probe
//! with the count still at threshold reopens the circuit immediately.

pub mod config;
pub mod recovery;
pub mod stats;

pub use config::*;
pub use recovery::*;
pub use stats::*;

use crate::{logging, utils, Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// States of the circuit breaker state machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Closed,
    HalfOpen,
    Open,
}

impl Default for State {
    fn default() -> State {
        State::Closed
    }
}

/// Mutable record of a breaker. Counters are read-modify-write, so the whole
/// record sits behind one mutex.
#[derive(Debug, Default)]
struct BreakerInner {
    state: State,
    failure_count: u32,
    last_failure_time: Option<u64>,
    last_success_time: Option<u64>,
    stats: BreakerStats,
    history: StateHistory,
}

/// Per-service failure tracker with timed recovery. One instance exists per
/// named external service, owned by the `HealthRegistry`.
#[derive(Debug)]
pub struct CircuitBreaker {
    service_name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
    recovery: Mutex<Option<RecoveryTicker>>,
}

impl CircuitBreaker {
    pub fn new(service_name: impl Into<String>, config: BreakerConfig) -> Result<CircuitBreaker> {
        config.is_valid()?;
        Ok(CircuitBreaker {
            service_name: service_name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                stats: BreakerStats {
                    last_state_change_time: utils::curr_time_millis(),
                    ..Default::default()
                },
                ..Default::default()
            }),
            recovery: Mutex::new(None),
        })
    }

    #[inline]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    #[inline]
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// `current_state` returns the current state of the circuit breaker.
    pub fn current_state(&self) -> State {
        self.inner.lock().unwrap().state
    }

    /// `mark_success` records a completed successful call. A success while
    /// half-open closes the circuit and zeroes the failure count; otherwise
    /// it pays down the failure count by one (floor 0). Never fails.
    pub fn mark_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.stats.total_requests += 1;
        inner.stats.successful_requests += 1;
        inner.stats.consecutive_failures = 0;
        inner.stats.consecutive_successes += 1;
        inner.last_success_time = Some(utils::curr_time_millis());
        if inner.state == State::HalfOpen {
            inner.failure_count = 0;
            self.transit(&mut inner, State::Closed);
        } else {
            inner.failure_count = inner.failure_count.saturating_sub(1);
        }
    }

    /// `mark_failure` records a completed failed call and opens the circuit
    /// once `failure_count` reaches the configured threshold.
    pub fn mark_failure(&self, err: &Error) {
        let mut inner = self.inner.lock().unwrap();
        inner.stats.total_requests += 1;
        inner.stats.failed_requests += 1;
        inner.stats.consecutive_successes = 0;
        inner.stats.consecutive_failures += 1;
        inner.failure_count += 1;
        inner.last_failure_time = Some(utils::curr_time_millis());
        logging::warn!(
            "[CircuitBreaker] {} recorded failure {}/{}: {}",
            self.service_name,
            inner.failure_count,
            self.config.failure_threshold,
            err
        );
        if inner.failure_count >= self.config.failure_threshold && inner.state != State::Open {
            self.transit(&mut inner, State::Open);
        }
    }

    /// `is_healthy` reports whether a call may be attempted right now.
    /// On an open circuit whose recovery dwell has elapsed it transforms to
    /// half-open and returns `true`, admitting the caller as the probe.
    pub fn is_healthy(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed | State::HalfOpen => true,
            State::Open => {
                if self.recovery_dwell_elapsed(&inner) {
                    self.transit(&mut inner, State::HalfOpen);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// `status` returns a serializable snapshot. It is a pure observer: the
    /// healthy flag is computed without performing the half-open admission
    /// that `is_healthy` does.
    pub fn status(&self) -> BreakerStatus {
        let inner = self.inner.lock().unwrap();
        let healthy = match inner.state {
            State::Open => self.recovery_dwell_elapsed(&inner),
            _ => true,
        };
        BreakerStatus {
            service_name: self.service_name.clone(),
            state: inner.state,
            healthy,
            failure_count: inner.failure_count,
            failure_threshold: self.config.failure_threshold,
            last_failure_time: inner.last_failure_time,
            last_success_time: inner.last_success_time,
            last_state_change: utils::format_time_millis(inner.stats.last_state_change_time),
            stats: inner.stats.snapshot(),
            config: self.config.clone(),
        }
    }

    /// `state_history` returns the bounded transition log, oldest first.
    pub fn state_history(&self) -> Vec<StateRecord> {
        self.inner.lock().unwrap().history.to_vec()
    }

    /// `reset` forces the breaker back to `Closed` with a clean failure
    /// budget. Request counters are kept.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_count = 0;
        inner.last_failure_time = None;
        inner.stats.consecutive_failures = 0;
        self.transit(&mut inner, State::Closed);
    }

    /// `start_auto_recovery` spawns the periodic poller that flips an open
    /// circuit to half-open once the dwell elapses, even without an
    /// intervening `is_healthy` call. Idempotent.
    pub fn start_auto_recovery(self: Arc<Self>) {
        let mut slot = self.recovery.lock().unwrap();
        if slot.is_some() {
            return;
        }
        let period_ms = std::cmp::max(self.config.recovery_timeout_ms / 2, 1);
        *slot = Some(RecoveryTicker::spawn(
            self.service_name.clone(),
            period_ms,
            Arc::downgrade(&self),
        ));
    }

    /// `stop_auto_recovery` cancels the poller and joins its thread.
    /// Idempotent; safe to call on a breaker that never started one.
    pub fn stop_auto_recovery(&self) {
        self.recovery.lock().unwrap().take();
    }

    /// Timer-driven edge: `Open -> HalfOpen` once the dwell has elapsed.
    pub(crate) fn try_recover(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == State::Open && self.recovery_dwell_elapsed(&inner) {
            self.transit(&mut inner, State::HalfOpen);
        }
    }

    fn recovery_dwell_elapsed(&self, inner: &BreakerInner) -> bool {
        let now = utils::curr_time_millis();
        inner
            .last_failure_time
            .map_or(true, |t| now.saturating_sub(t) >= self.config.recovery_timeout_ms)
    }

    fn transit(&self, inner: &mut BreakerInner, to: State) {
        let previous = inner.state;
        if previous == to {
            return;
        }
        inner.state = to;
        let now = utils::curr_time_millis();
        inner.stats.last_state_change_time = now;
        inner.history.push(previous, to, now);
        logging::info!(
            "[CircuitBreaker] {} state change: {:?} -> {:?}",
            self.service_name,
            previous,
            to
        );
    }
}

/// Point-in-time view of one breaker, exported through `HealthRegistry`
/// snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    pub service_name: String,
    pub state: State,
    pub healthy: bool,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub last_failure_time: Option<u64>,
    pub last_success_time: Option<u64>,
    pub last_state_change: String,
    pub stats: StatsSnapshot,
    pub config: BreakerConfig,
}
