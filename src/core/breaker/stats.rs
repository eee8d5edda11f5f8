use super::State;
use serde::Serialize;
use std::collections::VecDeque;

/// Upper bound on retained state transitions per breaker.
pub const STATE_HISTORY_CAP: usize = 100;

/// Request counters of a single breaker. All counters are monotonic except
/// the consecutive pair, which reset on the opposite outcome.
#[derive(Debug, Clone, Default)]
pub struct BreakerStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub consecutive_failures: u64,
    pub consecutive_successes: u64,
    /// timestamp (ms) of the latest state transition; creation time initially
    pub last_state_change_time: u64,
}

impl BreakerStats {
    /// Formatted as `"{:.2}%"`; `"0.00%"` before any request completes.
    pub fn success_rate(&self) -> String {
        if self.total_requests == 0 {
            return "0.00%".into();
        }
        format!(
            "{:.2}%",
            self.successful_requests as f64 / self.total_requests as f64 * 100.0
        )
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            last_state_change_time: self.last_state_change_time,
            success_rate: self.success_rate(),
        }
    }
}

/// Serializable counter snapshot carried inside `BreakerStatus`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub consecutive_failures: u64,
    pub consecutive_successes: u64,
    pub last_state_change_time: u64,
    pub success_rate: String,
}

/// One recorded state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateRecord {
    pub state: State,
    pub previous_state: State,
    pub timestamp: u64,
}

/// Bounded transition log; appends evict the oldest entry past the cap.
#[derive(Debug)]
pub(crate) struct StateHistory {
    records: VecDeque<StateRecord>,
}

impl Default for StateHistory {
    fn default() -> Self {
        StateHistory {
            records: VecDeque::with_capacity(STATE_HISTORY_CAP),
        }
    }
}

impl StateHistory {
    pub(crate) fn push(&mut self, previous_state: State, state: State, timestamp: u64) {
        if self.records.len() == STATE_HISTORY_CAP {
            self.records.pop_front();
        }
        self.records.push_back(StateRecord {
            state,
            previous_state,
            timestamp,
        });
    }

    pub(crate) fn to_vec(&self) -> Vec<StateRecord> {
        self.records.iter().copied().collect()
    }
}
