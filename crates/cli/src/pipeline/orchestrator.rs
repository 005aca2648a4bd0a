//! Relay orchestrator - wires listener, intake and dispatcher together.

use std::future::Future;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::RelayBlueprint;
use ingestion::EventIntake;
use tokio::net::TcpListener;
use tracing::{info, instrument};

use super::RelayStats;

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Validated blueprint, CLI overrides already applied
    pub blueprint: RelayBlueprint,
}

/// Main relay orchestrator
pub struct Relay {
    config: RelayConfig,
}

impl Relay {
    /// Create a new relay with the given configuration
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Bind the configured address and run until `shutdown` resolves
    pub async fn run<S>(self, shutdown: S) -> Result<RelayStats>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.blueprint.server.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        self.run_on(listener, shutdown).await
    }

    /// Run on an already bound listener.
    ///
    /// Once the listener stops, the last intake handle is dropped, which lets
    /// the dispatcher drain and report what is left.
    #[instrument(name = "relay_run", skip_all)]
    pub async fn run_on<S>(self, listener: TcpListener, shutdown: S) -> Result<RelayStats>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let start_time = Instant::now();
        let blueprint = self.config.blueprint;

        let (dispatcher, handle) =
            dispatcher::create_dispatcher(&blueprint).context("Failed to create dispatcher")?;
        let dispatcher_task = dispatcher.spawn();

        info!(
            destinations = handle.destinations().len(),
            flush_interval_secs = blueprint.dispatch.flush_interval_secs,
            unknown_destination = ?blueprint.dispatch.unknown_destination,
            "Dispatcher running"
        );

        let intake = EventIntake::from_config(handle, &blueprint.dispatch);
        let served = ingestion::serve(
            listener,
            intake.clone(),
            blueprint.server.max_body_bytes,
            shutdown,
        )
        .await;

        let intake_stats = intake.metrics().snapshot();
        drop(intake);

        let queues = dispatcher_task
            .await
            .context("Dispatcher task panicked")?;
        served.context("Webhook listener failed")?;

        Ok(RelayStats {
            duration: start_time.elapsed(),
            events_accepted: intake_stats.events_accepted,
            events_dropped: intake_stats.events_dropped,
            requests_rejected: intake_stats.requests_rejected,
            queues,
        })
    }
}
