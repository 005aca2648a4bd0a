//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Event routed to a destination that is not configured
    #[error("unknown destination '{name}'")]
    UnknownDestination { name: String },

    /// Outcome does not belong to the attempt currently in flight
    #[error("stale outcome for destination '{destination}': attempt {attempt_id} is not in flight")]
    StaleOutcome {
        destination: String,
        attempt_id: u64,
    },

    /// Batch could not be encoded as a JSON array
    #[error("failed to serialize batch for '{destination}': {source}")]
    Serialize {
        destination: String,
        #[source]
        source: serde_json::Error,
    },

    /// Transport creation error
    #[error("failed to create transport: {message}")]
    TransportCreation { message: String },

    /// Dispatcher task is no longer running
    #[error("dispatcher is closed")]
    Closed,

    /// Transport error (from contract)
    #[error("transport error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    /// Create an unknown destination error
    pub fn unknown_destination(name: impl Into<String>) -> Self {
        Self::UnknownDestination { name: name.into() }
    }

    /// Create a stale outcome error
    pub fn stale_outcome(destination: impl Into<String>, attempt_id: u64) -> Self {
        Self::StaleOutcome {
            destination: destination.into(),
            attempt_id,
        }
    }
}
