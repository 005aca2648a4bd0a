//! DispatchEngine - owns every destination queue and drives flush cycles

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use contracts::{DeliveryTransport, Event};

use crate::delivery::{AttemptOptions, DeliveryAttempt, DeliveryOutcome};
use crate::error::DispatcherError;
use crate::metrics::QueueStatus;
use crate::queue::DestinationQueue;

/// An event paired with the destination it was resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedEvent {
    pub destination: String,
    pub event: Event,
}

impl RoutedEvent {
    pub fn new(destination: impl Into<String>, event: Event) -> Self {
        Self {
            destination: destination.into(),
            event,
        }
    }
}

/// Queue owner and flush driver.
///
/// A single task owns the engine and feeds it intake, ticks and outcomes one
/// at a time; delivery attempts only ever talk back through `outcomes_tx`.
pub struct DispatchEngine<T> {
    queues: BTreeMap<String, DestinationQueue>,
    transport: Arc<T>,
    outcomes_tx: mpsc::UnboundedSender<DeliveryOutcome>,
    attempt_options: AttemptOptions,
}

impl<T> DispatchEngine<T>
where
    T: DeliveryTransport + Send + Sync + 'static,
{
    /// Build one queue per configured destination
    pub fn new(
        destinations: &BTreeMap<String, String>,
        transport: Arc<T>,
        attempt_options: AttemptOptions,
        outcomes_tx: mpsc::UnboundedSender<DeliveryOutcome>,
    ) -> Self {
        let queues: BTreeMap<String, DestinationQueue> = destinations
            .iter()
            .map(|(name, url)| (name.clone(), DestinationQueue::new(name, url)))
            .collect();

        info!(
            destinations = queues.len(),
            names = ?queues.keys().collect::<Vec<_>>(),
            "Destination queues created"
        );

        Self {
            queues,
            transport,
            outcomes_tx,
            attempt_options,
        }
    }

    /// Whether `name` is a configured destination
    pub fn contains(&self, name: &str) -> bool {
        self.queues.contains_key(name)
    }

    /// Configured destination names
    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.queues.keys().map(String::as_str)
    }

    /// Queue for a destination
    pub fn queue(&self, name: &str) -> Option<&DestinationQueue> {
        self.queues.get(name)
    }

    /// Append one event to its destination queue
    pub fn enqueue(&mut self, routed: RoutedEvent) -> Result<(), DispatcherError> {
        let queue = self
            .queues
            .get_mut(&routed.destination)
            .ok_or_else(|| DispatcherError::unknown_destination(&routed.destination))?;
        queue.enqueue(routed.event);
        Ok(())
    }

    /// Enqueue a whole intake batch, then run one dispatch cycle.
    ///
    /// All destinations are checked before anything is enqueued, so a batch is
    /// either accepted entirely or not at all. Returns the number enqueued.
    pub fn submit(&mut self, batch: Vec<RoutedEvent>) -> Result<usize, DispatcherError> {
        if let Some(unknown) = batch.iter().find(|r| !self.contains(&r.destination)) {
            return Err(DispatcherError::unknown_destination(&unknown.destination));
        }

        let count = batch.len();
        for routed in batch {
            self.enqueue(routed)?;
        }
        self.dispatch_all();
        Ok(count)
    }

    /// Start a delivery attempt for every queue that is idle and non-empty.
    ///
    /// Returns the number of attempts started.
    pub fn dispatch_all(&mut self) -> usize {
        let depths: Vec<(&str, usize)> = self
            .queues
            .values()
            .map(|q| (q.name(), q.pending_len()))
            .collect();
        info!(queues = ?depths, "Dispatch");

        let mut started = 0;
        for queue in self.queues.values_mut() {
            if let Some(batch) = queue.try_flush() {
                let attempt_id = batch.attempt_id;

                match DeliveryAttempt::prepare(batch, self.attempt_options) {
                    Ok(attempt) => {
                        attempt.spawn(Arc::clone(&self.transport), self.outcomes_tx.clone());
                        started += 1;
                    }
                    Err(e) => {
                        // Nothing left the process; put the batch back for the next cycle
                        if let Err(stale) = queue.on_delivery_failure(attempt_id, &e) {
                            warn!(error = %stale, "Requeue after serialization failure rejected");
                        }
                    }
                }
            }

            observability::record_queue_depth(queue.name(), queue.pending_len(), queue.in_flight_len());
        }

        if started > 0 {
            debug!(attempts = started, "Delivery attempts started");
        }
        started
    }

    /// Apply a finished attempt to its queue
    pub fn complete(&mut self, outcome: DeliveryOutcome) -> Result<(), DispatcherError> {
        let queue = self
            .queues
            .get_mut(&outcome.destination)
            .ok_or_else(|| DispatcherError::unknown_destination(&outcome.destination))?;

        match &outcome.result {
            Ok(receipt) => {
                let delivered = queue.on_delivery_success(outcome.attempt_id)?;
                debug!(
                    destination = %outcome.destination,
                    status = receipt.status,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "Destination acknowledged batch"
                );
                observability::record_delivery_success(
                    &outcome.destination,
                    delivered,
                    outcome.elapsed.as_secs_f64() * 1000.0,
                );
            }
            Err(e) => {
                let requeued = queue.on_delivery_failure(outcome.attempt_id, e)?;
                observability::record_delivery_failure(&outcome.destination, requeued);
            }
        }

        observability::record_queue_depth(queue.name(), queue.pending_len(), queue.in_flight_len());
        Ok(())
    }

    /// Snapshot of every queue
    pub fn status(&self) -> Vec<QueueStatus> {
        self.queues.values().map(DestinationQueue::status).collect()
    }

    /// Number of destinations with an outstanding attempt
    pub fn in_flight_count(&self) -> usize {
        self.queues.values().filter(|q| q.is_in_flight()).count()
    }

    /// Events not yet delivered, across all destinations
    pub fn backlog(&self) -> usize {
        self.queues
            .values()
            .map(|q| q.pending_len() + q.in_flight_len())
            .sum()
    }
}
