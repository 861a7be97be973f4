use serde::{Deserialize, Serialize};

use crate::models::{CheckState, now_millis};

/// Classified result of one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Up,
    Down,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Up => write!(f, "up"),
            OutcomeStatus::Down => write!(f, "down"),
        }
    }
}

impl From<OutcomeStatus> for CheckState {
    fn from(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::Up => CheckState::Up,
            OutcomeStatus::Down => CheckState::Down,
        }
    }
}

/// Why a probe was classified as down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No response within the check's timeout
    Timeout,
    /// A response arrived with a status outside the success codes
    UnexpectedStatus,
    /// DNS, connection, TLS or protocol failure
    Network,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::UnexpectedStatus => write!(f, "unexpected status"),
            FailureReason::Network => write!(f, "network error"),
        }
    }
}

/// Result of probing one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Id of the check that was probed
    pub check_id: String,

    pub status: OutcomeStatus,

    /// HTTP status code, when a response arrived
    pub status_code: Option<u16>,

    /// Set for every `down` outcome
    pub reason: Option<FailureReason>,

    /// Underlying error detail for diagnostics
    pub error: Option<String>,

    /// Time spent waiting on the probe
    pub latency_ms: u64,

    /// Unix milliseconds when the probe started
    pub checked_at: i64,
}

impl Outcome {
    /// Mark the check as reachable with an accepted status
    pub fn up(check_id: impl Into<String>, status_code: u16, latency_ms: u64) -> Self {
        Self {
            check_id: check_id.into(),
            status: OutcomeStatus::Up,
            status_code: Some(status_code),
            reason: None,
            error: None,
            latency_ms,
            checked_at: now_millis(),
        }
    }

    /// Mark the check as failed for `reason`
    pub fn down(check_id: impl Into<String>, reason: FailureReason, latency_ms: u64) -> Self {
        Self {
            check_id: check_id.into(),
            status: OutcomeStatus::Down,
            status_code: None,
            reason: Some(reason),
            error: None,
            latency_ms,
            checked_at: now_millis(),
        }
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Pin the probe start time
    pub fn at(mut self, checked_at: i64) -> Self {
        self.checked_at = checked_at;
        self
    }
}
