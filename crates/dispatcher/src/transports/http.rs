//! HttpTransport - plain HTTP POST via reqwest

use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, instrument};

use contracts::{ContractError, DeliveryReceipt, DeliveryTransport};

use crate::error::DispatcherError;

/// Posts batches as-is; no headers beyond what reqwest adds, no auth
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport with a fresh connection pool
    pub fn new() -> Result<Self, DispatcherError> {
        let client = Client::builder()
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| DispatcherError::TransportCreation {
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl DeliveryTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(name = "http_transport_post", skip(self, body), fields(bytes = body.len()))]
    async fn post(&self, url: &str, body: Bytes) -> Result<DeliveryReceipt, ContractError> {
        let response = self
            .client
            .post(url)
            .body(body)
            .send()
            .await
            .map_err(|e| ContractError::transport(url, e.to_string()))?;

        let status = response.status().as_u16();
        // Drain the body so the connection goes back to the pool
        let body = response
            .bytes()
            .await
            .map_err(|e| ContractError::transport(url, e.to_string()))?;

        debug!(status, response_bytes = body.len(), "Destination responded");
        Ok(DeliveryReceipt { status })
    }
}
