use crate::geolocation::Coordinates;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Why a scan ended without a genuine/counterfeit verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndeterminateReason {
    /// No validated symbol before the scan deadline
    Timeout,
    NetworkFailure,
    BlurRetryExhausted,
    /// The authenticator answered with something other than a verdict
    InvalidResponse,
    /// No frame could be captured or encoded for submission
    CaptureFailed,
}

impl IndeterminateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndeterminateReason::Timeout => "timeout",
            IndeterminateReason::NetworkFailure => "network_failure",
            IndeterminateReason::BlurRetryExhausted => "blur_retry_exhausted",
            IndeterminateReason::InvalidResponse => "invalid_response",
            IndeterminateReason::CaptureFailed => "capture_failed",
        }
    }
}

impl FromStr for IndeterminateReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timeout" => Ok(IndeterminateReason::Timeout),
            "network_failure" => Ok(IndeterminateReason::NetworkFailure),
            "blur_retry_exhausted" => Ok(IndeterminateReason::BlurRetryExhausted),
            "invalid_response" => Ok(IndeterminateReason::InvalidResponse),
            "capture_failed" => Ok(IndeterminateReason::CaptureFailed),
            other => Err(format!("unknown indeterminate reason: {}", other)),
        }
    }
}

impl fmt::Display for IndeterminateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationOutcome {
    Genuine,
    Counterfeit,
    Indeterminate(IndeterminateReason),
}

impl AuthenticationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthenticationOutcome::Genuine => "genuine",
            AuthenticationOutcome::Counterfeit => "counterfeit",
            AuthenticationOutcome::Indeterminate(_) => "indeterminate",
        }
    }

    pub fn reason(&self) -> Option<IndeterminateReason> {
        match self {
            AuthenticationOutcome::Indeterminate(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for AuthenticationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticationOutcome::Indeterminate(reason) => write!(f, "indeterminate ({})", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Telemetry attached to a published outcome
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub device_id: String,
    pub batch: Option<String>,
    pub location: Option<Coordinates>,
}

/// Outcome as written to the session context
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedOutcome {
    pub outcome: AuthenticationOutcome,
    pub device_id: String,
    pub batch: Option<String>,
    pub location: Option<Coordinates>,
    /// Request counter from the counting endpoint, when it answered
    pub count: Option<u64>,
    pub published_at: DateTime<Utc>,
}
