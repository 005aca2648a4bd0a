//! EventIntake - resolves each event's destination and hands it to the engine

use std::sync::Arc;

use tracing::{debug, info, warn};

use contracts::{DispatchConfig, Event, UnknownDestinationPolicy};
use dispatcher::{DispatcherHandle, RoutedEvent};

use crate::error::{IngestionError, Result};
use crate::metrics::IntakeMetrics;

/// Result of one intake batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeReceipt {
    /// Events now sitting in a destination queue
    pub accepted: usize,
    /// Events skipped by the `drop` policy
    pub dropped: usize,
}

/// Event intake.
///
/// Cheap to clone; every clone feeds the same dispatcher.
#[derive(Debug, Clone)]
pub struct EventIntake {
    handle: DispatcherHandle,
    policy: UnknownDestinationPolicy,
    fallback: Arc<str>,
    metrics: Arc<IntakeMetrics>,
}

impl EventIntake {
    /// Create an intake routing into `handle`
    pub fn new(
        handle: DispatcherHandle,
        policy: UnknownDestinationPolicy,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            handle,
            policy,
            fallback: Arc::from(fallback.into()),
            metrics: Arc::new(IntakeMetrics::new()),
        }
    }

    /// Create an intake using the routing policy of a dispatch config
    pub fn from_config(handle: DispatcherHandle, config: &DispatchConfig) -> Self {
        Self::new(
            handle,
            config.unknown_destination,
            config.fallback_destination.clone(),
        )
    }

    /// Shared intake counters
    pub fn metrics(&self) -> &IntakeMetrics {
        &self.metrics
    }

    /// Destination tag of an event: `unique_args.deployment`, else `DEFAULT`
    pub fn resolve_destination(event: &Event) -> &str {
        event.destination_or_default()
    }

    /// Accept a single event
    pub async fn add_event(&self, event: Event) -> Result<IntakeReceipt> {
        self.add_events(vec![event]).await
    }

    /// Accept a batch of events and run one dispatch cycle.
    ///
    /// Routing is decided for the whole batch before anything is enqueued, so
    /// a rejected batch leaves every queue untouched.
    pub async fn add_events(&self, events: Vec<Event>) -> Result<IntakeReceipt> {
        let mut routed = Vec::with_capacity(events.len());
        let mut dropped = 0;

        for (index, event) in events.into_iter().enumerate() {
            match self.route(index, event) {
                Ok(Some(event)) => routed.push(event),
                Ok(None) => dropped += 1,
                Err(e) => {
                    self.metrics.record_rejected("unknown_destination");
                    warn!(error = %e, "Intake batch rejected");
                    return Err(e);
                }
            }
        }

        for routed_event in &routed {
            let event = &routed_event.event;
            info!(
                event_type = event.event_type().unwrap_or("-"),
                recipient = event.recipient().unwrap_or("-"),
                destination = %routed_event.destination,
                "Event received"
            );
        }

        // An empty batch still runs a dispatch cycle for requeued events
        if routed.is_empty() {
            debug!(dropped, "Nothing to enqueue");
        }

        let destinations: Vec<String> = routed.iter().map(|r| r.destination.clone()).collect();
        let accepted = self.handle.submit(routed).await?;
        for destination in &destinations {
            self.metrics.record_accepted(destination);
        }

        Ok(IntakeReceipt { accepted, dropped })
    }

    fn route(&self, index: usize, event: Event) -> Result<Option<RoutedEvent>> {
        let destination = Self::resolve_destination(&event).to_owned();
        if self.handle.is_configured(&destination) {
            return Ok(Some(RoutedEvent::new(destination, event)));
        }

        match self.policy {
            UnknownDestinationPolicy::RejectBatch => {
                Err(IngestionError::UnknownDestination { index, destination })
            }
            UnknownDestinationPolicy::Drop => {
                warn!(destination = %destination, index, "Dropping event for unknown destination");
                self.metrics.record_dropped("unknown_destination");
                Ok(None)
            }
            UnknownDestinationPolicy::Fallback => {
                debug!(
                    destination = %destination,
                    fallback = %self.fallback,
                    "Rerouting event to fallback destination"
                );
                Ok(Some(RoutedEvent::new(self.fallback.as_ref(), event)))
            }
        }
    }
}
