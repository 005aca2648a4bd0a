//! DeliveryAttempt - one outbound transfer of a batch to a destination

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use contracts::{ContractError, DeliveryReceipt, DeliveryTransport};

use crate::error::DispatcherError;
use crate::queue::FlushedBatch;

/// Per-attempt behaviour
#[derive(Debug, Clone, Copy, Default)]
pub struct AttemptOptions {
    /// Abort the transfer after this long (None = transport default)
    pub timeout: Option<Duration>,
    /// Treat non-2xx responses as failures
    pub fail_on_error_status: bool,
}

/// Terminal result of a delivery attempt, reported back to the engine
#[derive(Debug)]
pub struct DeliveryOutcome {
    /// Destination the batch belongs to
    pub destination: String,
    /// Attempt id issued by the queue
    pub attempt_id: u64,
    /// Number of events in the batch
    pub events: usize,
    /// Wall time spent on the transfer
    pub elapsed: Duration,
    /// Receipt on success, transport error on failure
    pub result: Result<DeliveryReceipt, ContractError>,
}

impl DeliveryOutcome {
    /// Whether the attempt succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// A batch serialized and ready to be posted
#[derive(Debug)]
pub struct DeliveryAttempt {
    destination: String,
    url: String,
    attempt_id: u64,
    events: usize,
    body: Bytes,
    options: AttemptOptions,
}

impl DeliveryAttempt {
    /// Serialize a flushed batch as a single JSON array
    pub fn prepare(
        batch: FlushedBatch<'_>,
        options: AttemptOptions,
    ) -> Result<Self, DispatcherError> {
        let body = serde_json::to_vec(batch.events).map_err(|source| {
            DispatcherError::Serialize {
                destination: batch.destination.to_string(),
                source,
            }
        })?;

        Ok(Self {
            destination: batch.destination.to_string(),
            url: batch.url.to_string(),
            attempt_id: batch.attempt_id,
            events: batch.events.len(),
            body: Bytes::from(body),
            options,
        })
    }

    /// Destination name
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Attempt id
    pub fn attempt_id(&self) -> u64 {
        self.attempt_id
    }

    /// Serialized request body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Perform the transfer and produce exactly one outcome
    #[instrument(
        name = "delivery_attempt_execute",
        skip(self, transport),
        fields(destination = %self.destination, attempt_id = self.attempt_id, events = self.events)
    )]
    pub async fn execute<T: DeliveryTransport>(self, transport: &T) -> DeliveryOutcome {
        let Self {
            destination,
            url,
            attempt_id,
            events,
            body,
            options,
        } = self;

        debug!(url = %url, bytes = body.len(), transport = transport.name(), "Posting batch");

        let started = Instant::now();
        let result = match options.timeout {
            Some(limit) => match tokio::time::timeout(limit, transport.post(&url, body)).await {
                Ok(result) => result,
                Err(_) => Err(ContractError::Timeout {
                    url: url.clone(),
                    waited_ms: limit.as_millis() as u64,
                }),
            },
            None => transport.post(&url, body).await,
        };

        let result = result.and_then(|receipt| {
            if options.fail_on_error_status && !receipt.is_success_status() {
                Err(ContractError::transport(
                    &url,
                    format!("destination answered HTTP {}", receipt.status),
                ))
            } else {
                Ok(receipt)
            }
        });

        DeliveryOutcome {
            destination,
            attempt_id,
            events,
            elapsed: started.elapsed(),
            result,
        }
    }

    /// Run the attempt as its own task, reporting the outcome on `outcomes`
    pub fn spawn<T>(
        self,
        transport: Arc<T>,
        outcomes: mpsc::UnboundedSender<DeliveryOutcome>,
    ) -> JoinHandle<()>
    where
        T: DeliveryTransport + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            let outcome = self.execute(transport.as_ref()).await;
            if let Err(mpsc::error::SendError(outcome)) = outcomes.send(outcome) {
                warn!(
                    destination = %outcome.destination,
                    attempt_id = outcome.attempt_id,
                    "Dispatcher gone, delivery outcome discarded"
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::DestinationQueue;
    use contracts::Event;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::time::sleep;

    /// Mock transport for testing
    struct MockTransport {
        status: u16,
        fail: bool,
        delay_ms: u64,
        requests: Mutex<Vec<(String, Bytes)>>,
    }

    impl MockTransport {
        fn new(status: u16) -> Self {
            Self {
                status,
                fail: false,
                delay_ms: 0,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl DeliveryTransport for MockTransport {
        fn name(&self) -> &str {
            "mock"
        }

        async fn post(&self, url: &str, body: Bytes) -> Result<DeliveryReceipt, ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            self.requests.lock().unwrap().push((url.to_string(), body));
            if self.fail {
                return Err(ContractError::transport(url, "connection refused"));
            }
            Ok(DeliveryReceipt {
                status: self.status,
            })
        }
    }

    fn queue_with_event() -> DestinationQueue {
        let mut queue = DestinationQueue::new("a", "http://a.example/hook");
        queue.enqueue(
            Event::from_value(json!({
                "event": "open",
                "email": "x@y.com",
                "unique_args": { "deployment": "a" }
            }))
            .unwrap(),
        );
        queue
    }

    #[test]
    fn test_prepare_serializes_json_array() {
        let mut queue = queue_with_event();
        let attempt =
            DeliveryAttempt::prepare(queue.try_flush().unwrap(), AttemptOptions::default())
                .unwrap();

        assert_eq!(attempt.destination(), "a");
        assert_eq!(attempt.attempt_id(), 1);
        assert_eq!(
            attempt.body().as_ref(),
            br#"[{"event":"open","email":"x@y.com","unique_args":{"deployment":"a"}}]"#
        );
    }

    #[tokio::test]
    async fn test_execute_success_posts_once() {
        let mut queue = queue_with_event();
        let attempt =
            DeliveryAttempt::prepare(queue.try_flush().unwrap(), AttemptOptions::default())
                .unwrap();
        let transport = MockTransport::new(200);

        let outcome = attempt.execute(&transport).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.destination, "a");
        assert_eq!(outcome.events, 1);

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "http://a.example/hook");
    }

    #[tokio::test]
    async fn test_error_status_is_success_by_default() {
        let mut queue = queue_with_event();
        let attempt =
            DeliveryAttempt::prepare(queue.try_flush().unwrap(), AttemptOptions::default())
                .unwrap();

        let outcome = attempt.execute(&MockTransport::new(500)).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_error_status_fails_when_configured() {
        let mut queue = queue_with_event();
        let options = AttemptOptions {
            fail_on_error_status: true,
            ..Default::default()
        };
        let attempt = DeliveryAttempt::prepare(queue.try_flush().unwrap(), options).unwrap();

        let outcome = attempt.execute(&MockTransport::new(503)).await;
        assert!(!outcome.is_success());
        assert!(outcome.result.unwrap_err().to_string().contains("HTTP 503"));
    }

    #[tokio::test]
    async fn test_transport_error_is_failure() {
        let mut queue = queue_with_event();
        let attempt =
            DeliveryAttempt::prepare(queue.try_flush().unwrap(), AttemptOptions::default())
                .unwrap();
        let mut transport = MockTransport::new(200);
        transport.fail = true;

        let outcome = attempt.execute(&transport).await;
        assert!(matches!(outcome.result, Err(ContractError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_timeout_is_failure() {
        let mut queue = queue_with_event();
        let options = AttemptOptions {
            timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let attempt = DeliveryAttempt::prepare(queue.try_flush().unwrap(), options).unwrap();
        let mut transport = MockTransport::new(200);
        transport.delay_ms = 500;

        let outcome = attempt.execute(&transport).await;
        assert!(matches!(outcome.result, Err(ContractError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_spawn_reports_outcome() {
        let mut queue = queue_with_event();
        let attempt =
            DeliveryAttempt::prepare(queue.try_flush().unwrap(), AttemptOptions::default())
                .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        attempt
            .spawn(Arc::new(MockTransport::new(202)), tx)
            .await
            .unwrap();

        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.attempt_id, 1);
        assert_eq!(outcome.result.unwrap().status, 202);
    }
}
