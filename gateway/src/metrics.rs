//! Request counters for gateway monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

use txledger_protocol::StatusCode;

/// Gateway metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Total requests decoded.
    pub requests_total: AtomicU64,
    /// Requests answered OK.
    pub requests_ok: AtomicU64,
    /// Requests refused by business rules (unknown account, funds, currency).
    pub requests_rejected: AtomicU64,
    /// Requests with bad arguments or undecodable frames.
    pub requests_invalid: AtomicU64,
    /// Requests that ran out of time.
    pub requests_deadline_exceeded: AtomicU64,
    /// Internal failures.
    pub requests_internal: AtomicU64,
    /// Open client connections.
    pub connections_active: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment requests received.
    pub fn request_received(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the status a request was answered with.
    pub fn request_completed(&self, status: StatusCode) {
        let counter = match status {
            StatusCode::Ok => &self.requests_ok,
            StatusCode::NotFound | StatusCode::FailedPrecondition | StatusCode::OutOfRange => {
                &self.requests_rejected
            }
            StatusCode::InvalidArgument => &self.requests_invalid,
            StatusCode::DeadlineExceeded => &self.requests_deadline_exceeded,
            StatusCode::Internal => &self.requests_internal,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection opened.
    pub fn connection_opened(&self) {
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection closed.
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_ok: self.requests_ok.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            requests_invalid: self.requests_invalid.load(Ordering::Relaxed),
            requests_deadline_exceeded: self.requests_deadline_exceeded.load(Ordering::Relaxed),
            requests_internal: self.requests_internal.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_ok: u64,
    pub requests_rejected: u64,
    pub requests_invalid: u64,
    pub requests_deadline_exceeded: u64,
    pub requests_internal: u64,
    pub connections_active: u64,
}
