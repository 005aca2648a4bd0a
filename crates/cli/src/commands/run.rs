//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::RelayBlueprint;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Relay, RelayConfig};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after command-line overrides")?;

    info!(
        host = %blueprint.server.host,
        port = blueprint.server.port,
        destinations = blueprint.destinations.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let relay = Relay::new(RelayConfig { blueprint });

    info!("Starting relay...");
    let stats = relay
        .run(shutdown_signal())
        .await
        .context("Relay execution failed")?;

    let undelivered = stats.undelivered();
    if undelivered > 0 {
        warn!(undelivered, "Relay stopped with undelivered events");
    }
    info!(
        events_accepted = stats.events_accepted,
        events_delivered = stats.delivered_total(),
        duration_secs = stats.duration.as_secs_f64(),
        "Relay stopped"
    );
    stats.print_summary();

    Ok(())
}

/// Apply CLI overrides onto the loaded blueprint
fn apply_overrides(blueprint: &mut RelayBlueprint, args: &RunArgs) {
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding listen host from CLI");
        blueprint.server.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port = %port, "Overriding listen port from CLI");
        blueprint.server.port = port;
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping relay...");
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &RelayBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Listener: {}", blueprint.server.bind_addr());
    println!("  Max body: {} bytes", blueprint.server.max_body_bytes);
    println!("\nDispatch:");
    println!("  Flush interval: {}s", blueprint.dispatch.flush_interval_secs);
    match blueprint.dispatch.attempt_timeout_secs {
        Some(secs) if secs > 0 => println!("  Attempt timeout: {}s", secs),
        _ => println!("  Attempt timeout: none"),
    }
    println!("  Unknown destinations: {:?}", blueprint.dispatch.unknown_destination);
    println!("\nDestinations ({}):", blueprint.destinations.len());
    for (name, url) in &blueprint.destinations {
        println!("  - {} -> {}", name, url);
    }
    println!();
}
