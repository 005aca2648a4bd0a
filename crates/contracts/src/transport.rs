//! DeliveryTransport trait - Dispatcher output interface
//!
//! Defines the abstract outbound channel a delivery attempt posts through.

use bytes::Bytes;

use crate::ContractError;

/// Result of a completed outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// HTTP status returned by the destination
    pub status: u16,
}

impl DeliveryReceipt {
    /// Whether the destination answered with a 2xx status
    pub fn is_success_status(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound transport trait
///
/// All transport implementations must implement this trait.
#[trait_variant::make(DeliveryTransport: Send)]
pub trait LocalDeliveryTransport {
    /// Transport name (used for logging)
    fn name(&self) -> &str;

    /// POST a serialized batch to `url`
    ///
    /// Completes with a receipt once any response is received.
    ///
    /// # Errors
    /// Returns a transport error when no response could be obtained
    async fn post(&self, url: &str, body: Bytes) -> Result<DeliveryReceipt, ContractError>;
}
