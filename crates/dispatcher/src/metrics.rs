//! Queue metrics for observability

use serde::Serialize;

/// Running counters for a single destination queue
///
/// Only the engine task mutates these, so plain integers suffice.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueueCounters {
    /// Events accepted into the queue
    enqueued: u64,
    /// Events confirmed delivered
    delivered: u64,
    /// Attempts that ended in failure
    failed_attempts: u64,
    /// Attempts started
    attempts: u64,
}

impl QueueCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub(crate) fn add_enqueued(&mut self, n: usize) {
        self.enqueued += n as u64;
    }

    pub(crate) fn add_delivered(&mut self, n: usize) {
        self.delivered += n as u64;
    }

    pub(crate) fn inc_failed_attempts(&mut self) {
        self.failed_attempts += 1;
    }

    pub(crate) fn inc_attempts(&mut self) {
        self.attempts += 1;
    }
}

/// Snapshot of one destination queue (for reporting)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub destination: String,
    pub pending: usize,
    pub in_flight: usize,
    pub enqueued_total: u64,
    pub delivered_total: u64,
    pub failed_attempts: u64,
}
