//! Time utilities for txledger.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Default budget for a caller request (10 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A timestamp with timezone (always UTC).
///
/// Caller-supplied timestamps are descriptive only; ordering uses sequences.
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Caller-supplied deadline for a ledger operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    /// Instant after which the caller no longer waits.
    pub expires_at: Instant,
}

impl Deadline {
    /// Deadline `duration` from now.
    pub fn after(duration: Duration) -> Self {
        Self {
            expires_at: Instant::now() + duration,
        }
    }

    /// Deadline at a fixed instant.
    pub fn at(expires_at: Instant) -> Self {
        Self { expires_at }
    }

    /// Check if the deadline has passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Get remaining duration, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}
