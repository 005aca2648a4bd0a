//! # Contracts
//!
//! Frozen interface contracts shared by every relay crate.
//! Business crates depend only on this crate for cross-module types; reverse
//! dependencies are prohibited.
//!
//! ## Event Model
//! - An [`Event`] is an opaque JSON object forwarded verbatim
//! - Routing reads `unique_args.deployment`, logging reads `event` and `email`

mod blueprint;
mod error;
mod event;
mod transport;

pub use blueprint::*;
pub use error::*;
pub use event::*;
pub use transport::*;
