//! DispatcherHandle - the only way into the running dispatcher task

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::engine::RoutedEvent;
use crate::error::DispatcherError;
use crate::metrics::QueueStatus;

/// Requests served by the dispatcher loop
#[derive(Debug)]
pub(crate) enum Command {
    /// Enqueue an intake batch, then dispatch
    Submit {
        events: Vec<RoutedEvent>,
        reply: oneshot::Sender<Result<usize, DispatcherError>>,
    },
    /// Run a dispatch cycle now
    DispatchNow { reply: oneshot::Sender<usize> },
    /// Snapshot all queues
    Status {
        reply: oneshot::Sender<Vec<QueueStatus>>,
    },
}

/// Cloneable handle to a running dispatcher.
///
/// The dispatcher shuts down once every handle has been dropped.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Command>,
    destinations: Arc<BTreeSet<String>>,
}

impl DispatcherHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>, destinations: BTreeSet<String>) -> Self {
        Self {
            tx,
            destinations: Arc::new(destinations),
        }
    }

    /// Configured destination names (fixed for the process lifetime)
    pub fn destinations(&self) -> &BTreeSet<String> {
        &self.destinations
    }

    /// Whether `name` is a configured destination
    pub fn is_configured(&self, name: &str) -> bool {
        self.destinations.contains(name)
    }

    /// Hand routed events to the engine.
    ///
    /// Resolves once the events sit in their queues and a dispatch cycle ran.
    pub async fn submit(&self, events: Vec<RoutedEvent>) -> Result<usize, DispatcherError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Submit { events, reply }).await?;
        rx.await.map_err(|_| DispatcherError::Closed)?
    }

    /// Force a dispatch cycle; returns the number of attempts started
    pub async fn dispatch_now(&self) -> Result<usize, DispatcherError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::DispatchNow { reply }).await?;
        rx.await.map_err(|_| DispatcherError::Closed)
    }

    /// Per-destination queue snapshot
    pub async fn status(&self) -> Result<Vec<QueueStatus>, DispatcherError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply }).await?;
        rx.await.map_err(|_| DispatcherError::Closed)
    }

    async fn send(&self, command: Command) -> Result<(), DispatcherError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| DispatcherError::Closed)
    }
}
