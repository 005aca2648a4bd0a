//! Relay orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{Relay, RelayConfig};
pub use stats::RelayStats;
