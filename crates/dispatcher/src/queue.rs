//! DestinationQueue - pending buffer and in-flight tracking for one destination

use std::collections::VecDeque;
use std::fmt::Display;

use contracts::Event;
use tracing::{debug, error, info};

use crate::error::DispatcherError;
use crate::metrics::{QueueCounters, QueueStatus};

/// Batch currently submitted downstream
#[derive(Debug)]
struct InFlightBatch {
    attempt_id: u64,
    events: Vec<Event>,
}

/// Batch handed out by [`DestinationQueue::try_flush`]
#[derive(Debug)]
pub struct FlushedBatch<'a> {
    /// Destination name
    pub destination: &'a str,
    /// Delivery URL
    pub url: &'a str,
    /// Attempt id the outcome must quote back
    pub attempt_id: u64,
    /// Events in delivery order
    pub events: &'a [Event],
}

/// Ordered, unbounded buffer of events for one destination.
///
/// Every event lives in exactly one of `pending` or `in_flight` until its
/// batch is confirmed delivered. At most one batch is in flight at a time.
#[derive(Debug)]
pub struct DestinationQueue {
    name: String,
    url: String,
    pending: VecDeque<Event>,
    in_flight: Option<InFlightBatch>,
    next_attempt_id: u64,
    counters: QueueCounters,
}

impl DestinationQueue {
    /// Create an empty queue for a configured destination
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            pending: VecDeque::new(),
            in_flight: None,
            next_attempt_id: 0,
            counters: QueueCounters::new(),
        }
    }

    /// Destination name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delivery URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Append an event at the tail of `pending`
    pub fn enqueue(&mut self, event: Event) {
        self.pending.push_back(event);
        self.counters.add_enqueued(1);
    }

    /// Move all of `pending` into flight.
    ///
    /// Returns `None` without touching any state when a batch is already in
    /// flight or nothing is pending.
    pub fn try_flush(&mut self) -> Option<FlushedBatch<'_>> {
        if self.in_flight.is_some() || self.pending.is_empty() {
            return None;
        }

        let events: Vec<Event> = self.pending.drain(..).collect();
        self.next_attempt_id += 1;
        let attempt_id = self.next_attempt_id;
        self.counters.inc_attempts();

        debug!(
            destination = %self.name,
            attempt_id,
            events = events.len(),
            "Batch formed"
        );

        let batch = self.in_flight.insert(InFlightBatch { attempt_id, events });
        Some(FlushedBatch {
            destination: &self.name,
            url: &self.url,
            attempt_id,
            events: &batch.events,
        })
    }

    /// Discard the in-flight batch after a confirmed delivery.
    ///
    /// Returns the number of events delivered.
    pub fn on_delivery_success(&mut self, attempt_id: u64) -> Result<usize, DispatcherError> {
        let batch = self.take_in_flight(attempt_id)?;
        let count = batch.events.len();
        self.counters.add_delivered(count);

        info!(
            destination = %self.name,
            attempt_id,
            events = count,
            "Uploaded events"
        );
        Ok(count)
    }

    /// Put the in-flight batch back at the head of `pending`, original order kept.
    ///
    /// Returns the number of events requeued.
    pub fn on_delivery_failure(
        &mut self,
        attempt_id: u64,
        error: impl Display,
    ) -> Result<usize, DispatcherError> {
        let batch = self.take_in_flight(attempt_id)?;
        let count = batch.events.len();
        for event in batch.events.into_iter().rev() {
            self.pending.push_front(event);
        }
        self.counters.inc_failed_attempts();

        error!(
            destination = %self.name,
            attempt_id,
            events = count,
            pending = self.pending.len(),
            error = %error,
            "Could not upload events, batch requeued"
        );
        Ok(count)
    }

    /// Whether an attempt is outstanding
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Attempt id of the outstanding batch
    pub fn in_flight_attempt(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|b| b.attempt_id)
    }

    /// Number of events waiting for the next flush
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of events in the outstanding batch
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.as_ref().map_or(0, |b| b.events.len())
    }

    /// Pending events, head first
    pub fn pending(&self) -> impl Iterator<Item = &Event> {
        self.pending.iter()
    }

    /// Events of the outstanding batch
    pub fn in_flight_events(&self) -> Option<&[Event]> {
        self.in_flight.as_ref().map(|b| b.events.as_slice())
    }

    /// Running counters
    pub fn counters(&self) -> &QueueCounters {
        &self.counters
    }

    /// Snapshot for reporting
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            destination: self.name.clone(),
            pending: self.pending_len(),
            in_flight: self.in_flight_len(),
            enqueued_total: self.counters.enqueued(),
            delivered_total: self.counters.delivered(),
            failed_attempts: self.counters.failed_attempts(),
        }
    }

    fn take_in_flight(&mut self, attempt_id: u64) -> Result<InFlightBatch, DispatcherError> {
        match self.in_flight.take() {
            Some(batch) if batch.attempt_id == attempt_id => Ok(batch),
            other => {
                self.in_flight = other;
                Err(DispatcherError::stale_outcome(&self.name, attempt_id))
            }
        }
    }
}
