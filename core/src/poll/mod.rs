//! Refresh pacing for operator-triggered status polling.
//!
//! Each refresh performs exactly one status query; after a `Pending` reply
//! the gate arms a fixed wait during which further refreshes are answered
//! without touching the gateway. The wait is a deadline, not a sleep, so a
//! "return to menu" cancellation never has a delay to wait out.

use chrono::{DateTime, Duration, Utc};

/// Minimum seconds between two status queries for the same job.
pub const REFRESH_WAIT_SECS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollGate {
    not_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    /// The gate is open: perform the single status query.
    Proceed,
    /// Still inside the wait window; no query is made.
    Wait { remaining_secs: i64 },
}

impl PollGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decide(&self, now: DateTime<Utc>) -> RefreshDecision {
        match self.not_before {
            Some(deadline) if now < deadline => RefreshDecision::Wait {
                // Round up so the operator is never told zero seconds early.
                remaining_secs: ((deadline - now).num_milliseconds() + 999) / 1000,
            },
            _ => RefreshDecision::Proceed,
        }
    }

    /// Arm the wait window after a `Pending` reply.
    pub fn arm(&mut self, now: DateTime<Utc>) {
        self.not_before = Some(now + Duration::seconds(REFRESH_WAIT_SECS));
    }

    pub fn clear(&mut self) {
        self.not_before = None;
    }
}
