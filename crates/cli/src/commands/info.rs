//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::RelayBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    server: ServerInfo,
    dispatch: DispatchInfo,
    destinations: Vec<DestinationInfo>,
}

#[derive(Serialize)]
struct ServerInfo {
    listen: String,
    max_body_bytes: usize,
}

#[derive(Serialize)]
struct DispatchInfo {
    flush_interval_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempt_timeout_secs: Option<u64>,
    shutdown_grace_secs: u64,
    fail_on_error_status: bool,
    unknown_destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback_destination: Option<String>,
}

#[derive(Serialize)]
struct DestinationInfo {
    name: String,
    url: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &RelayBlueprint) -> ConfigInfo {
    let dispatch = &blueprint.dispatch;
    let policy = serde_json::to_value(dispatch.unknown_destination)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", dispatch.unknown_destination));

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        server: ServerInfo {
            listen: blueprint.server.bind_addr(),
            max_body_bytes: blueprint.server.max_body_bytes,
        },
        dispatch: DispatchInfo {
            flush_interval_secs: dispatch.flush_interval_secs,
            attempt_timeout_secs: dispatch.attempt_timeout().map(|d| d.as_secs()),
            shutdown_grace_secs: dispatch.shutdown_grace_secs,
            fail_on_error_status: dispatch.fail_on_error_status,
            fallback_destination: (dispatch.unknown_destination
                == contracts::UnknownDestinationPolicy::Fallback)
                .then(|| dispatch.fallback_destination.clone()),
            unknown_destination: policy,
        },
        destinations: blueprint
            .destinations
            .iter()
            .map(|(name, url)| DestinationInfo {
                name: name.clone(),
                url: url.clone(),
            })
            .collect(),
    }
}

fn print_config_info(blueprint: &RelayBlueprint) {
    let info = build_config_info(blueprint);

    println!("\n=== Webhook Relay Configuration ===\n");
    println!("Version: {}", info.version);
    println!("\nServer:");
    println!("  Listen: {}", info.server.listen);
    println!("  Max body: {} bytes", info.server.max_body_bytes);

    println!("\nDispatch:");
    println!("  Flush interval: {}s", info.dispatch.flush_interval_secs);
    match info.dispatch.attempt_timeout_secs {
        Some(secs) => println!("  Attempt timeout: {}s", secs),
        None => println!("  Attempt timeout: none"),
    }
    println!("  Shutdown grace: {}s", info.dispatch.shutdown_grace_secs);
    println!("  Fail on error status: {}", info.dispatch.fail_on_error_status);
    print!("  Unknown destinations: {}", info.dispatch.unknown_destination);
    match info.dispatch.fallback_destination {
        Some(ref fallback) => println!(" -> {}", fallback),
        None => println!(),
    }

    println!("\nDestinations ({}):", info.destinations.len());
    for destination in &info.destinations {
        println!("  - {} -> {}", destination.name, destination.url);
    }
    println!();
}
