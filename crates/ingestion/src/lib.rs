//! # Ingestion
//!
//! Webhook intake module.
//!
//! Responsibilities:
//! - Accept SendGrid-style event batches over HTTP (any path, POST)
//! - Resolve each event's destination from `unique_args.deployment`
//! - Apply the unknown-destination policy
//! - Hand routed events to the dispatcher
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{serve, EventIntake};
//!
//! let (dispatcher, handle) = dispatcher::create_dispatcher(&blueprint)?;
//! let task = dispatcher.spawn();
//!
//! let intake = EventIntake::from_config(handle, &blueprint.dispatch);
//! let listener = tokio::net::TcpListener::bind(blueprint.server.bind_addr()).await?;
//! serve(listener, intake, blueprint.server.max_body_bytes, shutdown_signal()).await?;
//! ```

mod error;
mod http;
mod intake;
mod metrics;

#[cfg(test)]
mod test_support;

// Re-exports
pub use error::{IngestionError, Result};
pub use http::{parse_events, router, serve};
pub use intake::{EventIntake, IntakeReceipt};
pub use metrics::{IntakeMetrics, IntakeSnapshot};
