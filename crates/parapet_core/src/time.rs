//! Time helpers.
//!
//! Wall clock timestamps are metadata (import attempt logs, session
//! last-access); execution deadlines are measured with `std::time::Instant`
//! by the execution context manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wall clock timestamp in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Get current timestamp
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create from a chrono datetime
    #[must_use]
    pub const fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get the inner datetime
    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Seconds elapsed since this timestamp (zero if in the future)
    #[must_use]
    pub fn age_seconds(&self) -> u64 {
        let delta = Utc::now().signed_duration_since(self.0);
        u64::try_from(delta.num_seconds()).unwrap_or(0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Convert a monotonic duration into fractional seconds for result payloads
#[must_use]
pub fn elapsed_seconds(duration: std::time::Duration) -> f64 {
    duration.as_secs_f64()
}
