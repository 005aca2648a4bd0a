//! Intake counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Intake metrics, shared by every request handler
#[derive(Debug, Default)]
pub struct IntakeMetrics {
    /// Events handed to the dispatcher
    pub events_accepted: AtomicU64,

    /// Events skipped by the `drop` policy
    pub events_dropped: AtomicU64,

    /// Requests refused (malformed body or unknown destination)
    pub requests_rejected: AtomicU64,
}

impl IntakeMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted event
    pub fn record_accepted(&self, destination: &str) {
        self.events_accepted.fetch_add(1, Ordering::Relaxed);
        observability::record_event_received(destination);
    }

    /// Record a dropped event
    pub fn record_dropped(&self, reason: &str) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
        observability::record_event_dropped(reason);
    }

    /// Record a refused request
    pub fn record_rejected(&self, reason: &str) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
        observability::record_request_rejected(reason);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> IntakeSnapshot {
        IntakeSnapshot {
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeSnapshot {
    pub events_accepted: u64,
    pub events_dropped: u64,
    pub requests_rejected: u64,
}
