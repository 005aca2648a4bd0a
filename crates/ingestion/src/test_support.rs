//! Shared fixtures for intake and listener tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use contracts::{ContractError, DeliveryReceipt, DeliveryTransport, Event};
use dispatcher::{AttemptOptions, Dispatcher, DispatcherConfig, DispatcherHandle, FlushTrigger, QueueStatus};
use serde_json::Value;
use tokio::task::JoinHandle;

/// Records every post; the first `failures` posts fail, the rest answer 200
#[derive(Default)]
pub(crate) struct RecordingTransport {
    pub posts: Mutex<Vec<(String, Bytes)>>,
    failures: AtomicUsize,
}

impl DeliveryTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn post(&self, url: &str, body: Bytes) -> Result<DeliveryReceipt, ContractError> {
        self.posts.lock().unwrap().push((url.to_string(), body));
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ContractError::transport(url, "connection refused"));
        }
        Ok(DeliveryReceipt { status: 200 })
    }
}

pub(crate) struct NeverTrigger;

impl FlushTrigger for NeverTrigger {
    async fn tick(&mut self) {
        std::future::pending::<()>().await;
    }
}

pub(crate) struct DispatcherStub {
    pub handle: DispatcherHandle,
    pub transport: Arc<RecordingTransport>,
    pub task: JoinHandle<Vec<QueueStatus>>,
}

impl DispatcherStub {
    pub async fn wait_for_posts(&self, count: usize) -> Vec<(String, Bytes)> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let posts = self.transport.posts.lock().unwrap();
                    if posts.len() >= count {
                        return posts.clone();
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("posts did not arrive in time")
    }

    /// Poll `destination` until its in-flight attempt has been resolved
    /// `failed` times
    pub async fn wait_for_failures(&self, destination: &str, failed: u64) -> QueueStatus {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let status = self.handle.status().await.unwrap();
                let queue = status
                    .into_iter()
                    .find(|s| s.destination == destination)
                    .unwrap();
                if queue.failed_attempts >= failed && queue.in_flight == 0 {
                    return queue;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("failures were not recorded in time")
    }
}

/// Dispatcher over `names`, each posting to `http://<name>.example/hook`
pub(crate) fn spawn_dispatcher(names: &[&str]) -> DispatcherStub {
    spawn_dispatcher_with_failures(names, 0)
}

/// Like [`spawn_dispatcher`], but the first `failures` posts fail
pub(crate) fn spawn_dispatcher_with_failures(names: &[&str], failures: usize) -> DispatcherStub {
    let destinations: BTreeMap<String, String> = names
        .iter()
        .map(|name| (name.to_string(), format!("http://{name}.example/hook")))
        .collect();
    let config = DispatcherConfig {
        destinations,
        attempt: AttemptOptions::default(),
        flush_interval: Duration::from_secs(60),
        shutdown_grace: Duration::from_millis(100),
        command_capacity: 16,
    };
    let transport = Arc::new(RecordingTransport {
        posts: Mutex::new(Vec::new()),
        failures: AtomicUsize::new(failures),
    });
    let (dispatcher, handle) = Dispatcher::new(&config, Arc::clone(&transport), NeverTrigger);
    DispatcherStub {
        handle,
        transport,
        task: dispatcher.spawn(),
    }
}

pub(crate) fn event(value: Value) -> Event {
    Event::from_value(value).unwrap()
}
