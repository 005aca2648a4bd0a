//! Dispatcher - the single task that owns the engine

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use contracts::{DeliveryTransport, RelayBlueprint};

use crate::delivery::{AttemptOptions, DeliveryOutcome};
use crate::engine::DispatchEngine;
use crate::error::DispatcherError;
use crate::handle::{Command, DispatcherHandle};
use crate::metrics::QueueStatus;
use crate::transports::HttpTransport;
use crate::trigger::{FlushTrigger, IntervalTrigger};

/// Default capacity of the command channel
const DEFAULT_COMMAND_CAPACITY: usize = 1024;

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Destination name -> delivery URL
    pub destinations: BTreeMap<String, String>,
    /// Per-attempt behaviour
    pub attempt: AttemptOptions,
    /// Period of the retry/flush trigger
    pub flush_interval: Duration,
    /// How long to wait for in-flight attempts on shutdown
    pub shutdown_grace: Duration,
    /// Command channel capacity
    pub command_capacity: usize,
}

impl DispatcherConfig {
    /// Derive dispatcher settings from a loaded blueprint
    pub fn from_blueprint(blueprint: &RelayBlueprint) -> Self {
        Self {
            destinations: blueprint.destinations.clone(),
            attempt: AttemptOptions {
                timeout: blueprint.dispatch.attempt_timeout(),
                fail_on_error_status: blueprint.dispatch.fail_on_error_status,
            },
            flush_interval: blueprint.dispatch.flush_interval(),
            shutdown_grace: blueprint.dispatch.shutdown_grace(),
            command_capacity: DEFAULT_COMMAND_CAPACITY,
        }
    }
}

/// The dispatcher task.
///
/// Intake submissions, trigger ticks and delivery outcomes are all handled
/// here, one at a time, so queue state needs no locking.
pub struct Dispatcher<T, F> {
    engine: DispatchEngine<T>,
    trigger: F,
    commands_rx: mpsc::Receiver<Command>,
    outcomes_rx: mpsc::UnboundedReceiver<DeliveryOutcome>,
    shutdown_grace: Duration,
}

impl<T, F> Dispatcher<T, F>
where
    T: DeliveryTransport + Send + Sync + 'static,
    F: FlushTrigger + 'static,
{
    /// Create a dispatcher and the handle that feeds it
    pub fn new(config: &DispatcherConfig, transport: Arc<T>, trigger: F) -> (Self, DispatcherHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(config.command_capacity.max(1));
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();

        let engine = DispatchEngine::new(&config.destinations, transport, config.attempt, outcomes_tx);
        let names: BTreeSet<String> = config.destinations.keys().cloned().collect();

        let dispatcher = Self {
            engine,
            trigger,
            commands_rx,
            outcomes_rx,
            shutdown_grace: config.shutdown_grace,
        };
        (dispatcher, DispatcherHandle::new(commands_tx, names))
    }

    /// Run the dispatcher main loop
    ///
    /// Returns when every handle is dropped, after draining in-flight
    /// attempts. The returned snapshot shows what was left undelivered.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(self) -> Vec<QueueStatus> {
        let Self {
            mut engine,
            mut trigger,
            mut commands_rx,
            mut outcomes_rx,
            shutdown_grace,
        } = self;

        info!(
            destinations = engine.destinations().count(),
            "Dispatcher started"
        );

        loop {
            tokio::select! {
                command = commands_rx.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    handle_command(&mut engine, command);
                }
                Some(outcome) = outcomes_rx.recv() => {
                    handle_outcome(&mut engine, outcome);
                }
                () = trigger.tick() => {
                    engine.dispatch_all();
                }
            }
        }

        info!(
            backlog = engine.backlog(),
            "Dispatcher input closed, shutting down"
        );

        drain(&mut engine, &mut outcomes_rx, shutdown_grace).await;
        let status = engine.status();
        for queue in status.iter().filter(|s| s.pending + s.in_flight > 0) {
            warn!(
                destination = %queue.destination,
                pending = queue.pending,
                in_flight = queue.in_flight,
                "Undelivered events discarded at shutdown"
            );
        }

        info!("Dispatcher shutdown complete");
        status
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<Vec<QueueStatus>> {
        tokio::spawn(self.run())
    }
}

fn handle_command<T>(engine: &mut DispatchEngine<T>, command: Command)
where
    T: DeliveryTransport + Send + Sync + 'static,
{
    match command {
        Command::Submit { events, reply } => {
            let result = engine.submit(events);
            if let Err(ref e) = result {
                warn!(error = %e, "Intake batch rejected by dispatcher");
            }
            let _ = reply.send(result);
        }
        Command::DispatchNow { reply } => {
            let _ = reply.send(engine.dispatch_all());
        }
        Command::Status { reply } => {
            let _ = reply.send(engine.status());
        }
    }
}

fn handle_outcome<T>(engine: &mut DispatchEngine<T>, outcome: DeliveryOutcome)
where
    T: DeliveryTransport + Send + Sync + 'static,
{
    if let Err(e) = engine.complete(outcome) {
        warn!(error = %e, "Delivery outcome ignored");
    }
}

/// Final flush, then wait for outstanding attempts up to `grace`
async fn drain<T>(
    engine: &mut DispatchEngine<T>,
    outcomes_rx: &mut mpsc::UnboundedReceiver<DeliveryOutcome>,
    grace: Duration,
) where
    T: DeliveryTransport + Send + Sync + 'static,
{
    engine.dispatch_all();

    let deadline = tokio::time::sleep(grace);
    tokio::pin!(deadline);

    while engine.in_flight_count() > 0 {
        tokio::select! {
            Some(outcome) = outcomes_rx.recv() => {
                handle_outcome(engine, outcome);
            }
            () = &mut deadline => {
                warn!(
                    in_flight = engine.in_flight_count(),
                    "Shutdown grace period elapsed with deliveries in flight"
                );
                break;
            }
        }
    }
    debug!("Dispatcher drained");
}

/// Convenience function to create an HTTP dispatcher from a blueprint
#[instrument(name = "dispatcher_create", skip(blueprint))]
pub fn create_dispatcher(
    blueprint: &RelayBlueprint,
) -> Result<(Dispatcher<HttpTransport, IntervalTrigger>, DispatcherHandle), DispatcherError> {
    let config = DispatcherConfig::from_blueprint(blueprint);
    let transport = Arc::new(HttpTransport::new()?);
    let trigger = IntervalTrigger::new(config.flush_interval);
    Ok(Dispatcher::new(&config, transport, trigger))
}
