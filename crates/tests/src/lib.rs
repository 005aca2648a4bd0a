//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置契约测试
//! - 端到端测试：真实 HTTP 监听 -> 分发引擎 -> 下游 stub

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ConfigVersion, UnknownDestinationPolicy};

    #[test]
    fn test_minimal_config_defaults() {
        let blueprint = ConfigLoader::load_from_str(
            r#"{"server": {"port": 8080}, "destinations": {"a": "http://a.example/hook"}}"#,
            ConfigFormat::Json,
        )
        .unwrap();

        assert_eq!(blueprint.version, ConfigVersion::V1);
        assert_eq!(blueprint.dispatch.flush_interval_secs, 5);
        assert_eq!(blueprint.dispatch.attempt_timeout(), None);
        assert!(!blueprint.dispatch.fail_on_error_status);
        assert_eq!(
            blueprint.dispatch.unknown_destination,
            UnknownDestinationPolicy::RejectBatch
        );
    }

    #[test]
    fn test_toml_roundtrip_keeps_destinations() {
        let blueprint = ConfigLoader::load_from_str(
            "[server]\nport = 8080\n\n[destinations]\nDEFAULT = \"http://d.example/\"\nci-server = \"http://ci.example/\"\n",
            ConfigFormat::Toml,
        )
        .unwrap();

        let toml = ConfigLoader::to_toml(&blueprint).unwrap();
        let reloaded = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(reloaded.destinations, blueprint.destinations);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::{StatusCode, Uri};
    use axum::Router;
    use bytes::Bytes;
    use config_loader::{ConfigFormat, ConfigLoader};
    use dispatcher::{create_dispatcher, DispatcherHandle, QueueStatus};
    use ingestion::EventIntake;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    /// One request seen by the downstream stub
    #[derive(Debug, Clone)]
    struct Seen {
        path: String,
        body: Value,
        accepted: bool,
    }

    #[derive(Default)]
    struct DownstreamState {
        seen: Mutex<Vec<Seen>>,
        down: AtomicBool,
    }

    /// Downstream deployment stub; answers 503 while `down` is set
    struct Downstream {
        addr: SocketAddr,
        state: Arc<DownstreamState>,
    }

    impl Downstream {
        async fn spawn() -> Self {
            let state = Arc::new(DownstreamState::default());
            let app = Router::new()
                .fallback(record)
                .with_state(Arc::clone(&state));
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            Self { addr, state }
        }

        fn url(&self, path: &str) -> String {
            format!("http://{}{}", self.addr, path)
        }

        fn set_down(&self, down: bool) {
            self.state.down.store(down, Ordering::SeqCst);
        }

        fn seen(&self) -> Vec<Seen> {
            self.state.seen.lock().unwrap().clone()
        }

        fn accepted(&self) -> Vec<Seen> {
            self.seen().into_iter().filter(|s| s.accepted).collect()
        }
    }

    async fn record(State(state): State<Arc<DownstreamState>>, uri: Uri, body: Bytes) -> StatusCode {
        let accepted = !state.down.load(Ordering::SeqCst);
        state.seen.lock().unwrap().push(Seen {
            path: uri.path().to_string(),
            body: serde_json::from_slice(&body).unwrap(),
            accepted,
        });
        if accepted {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }

    /// A relay listening on an ephemeral port
    struct Relay {
        addr: SocketAddr,
        handle: DispatcherHandle,
        stop: oneshot::Sender<()>,
        server: JoinHandle<std::io::Result<()>>,
        dispatcher: JoinHandle<Vec<QueueStatus>>,
    }

    impl Relay {
        async fn start(config: Value) -> Self {
            let blueprint =
                ConfigLoader::load_from_str(&config.to_string(), ConfigFormat::Json).unwrap();
            let (dispatcher, handle) = create_dispatcher(&blueprint).unwrap();
            let dispatcher = dispatcher.spawn();

            let intake = EventIntake::from_config(handle.clone(), &blueprint.dispatch);
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (stop, stopped) = oneshot::channel::<()>();
            let server = tokio::spawn(ingestion::serve(
                listener,
                intake,
                blueprint.server.max_body_bytes,
                async move {
                    let _ = stopped.await;
                },
            ));

            Self {
                addr,
                handle,
                stop,
                server,
                dispatcher,
            }
        }

        async fn post(&self, body: &str) -> (u16, String) {
            let response = reqwest::Client::new()
                .post(format!("http://{}/", self.addr))
                .body(body.to_string())
                .send()
                .await
                .unwrap();
            let status = response.status().as_u16();
            (status, response.text().await.unwrap())
        }

        async fn queue(&self, destination: &str) -> QueueStatus {
            self.handle
                .status()
                .await
                .unwrap()
                .into_iter()
                .find(|s| s.destination == destination)
                .unwrap()
        }

        /// Poll until `check` holds for `destination`'s queue
        async fn wait_until(&self, destination: &str, check: impl Fn(&QueueStatus) -> bool) {
            tokio::time::timeout(Duration::from_secs(10), async {
                loop {
                    if check(&self.queue(destination).await) {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            })
            .await
            .expect("queue did not reach expected state");
        }

        async fn stop(self) -> Vec<QueueStatus> {
            let _ = self.stop.send(());
            self.server.await.unwrap().unwrap();
            drop(self.handle);
            self.dispatcher.await.unwrap()
        }
    }

    fn event(kind: &str, deployment: Option<&str>) -> Value {
        match deployment {
            Some(name) => json!({
                "event": kind,
                "email": "x@y.com",
                "unique_args": { "deployment": name }
            }),
            None => json!({ "event": kind, "email": "x@y.com" }),
        }
    }

    /// The reference scenario: one event for `a` goes out once, verbatim
    #[tokio::test]
    async fn test_e2e_single_event_forwarded_verbatim() {
        let downstream = Downstream::spawn().await;
        let relay = Relay::start(json!({
            "server": { "port": 8080 },
            "destinations": { "a": downstream.url("/a/hook") }
        }))
        .await;

        let body = r#"[{"event":"open","email":"x@y.com","unique_args":{"deployment":"a"}}]"#;
        assert_eq!(relay.post(body).await, (200, "OK".to_string()));

        relay.wait_until("a", |q| q.delivered_total == 1).await;
        let seen = downstream.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path, "/a/hook");
        assert_eq!(seen[0].body, serde_json::from_str::<Value>(body).unwrap());

        let remaining = relay.stop().await;
        assert!(remaining.iter().all(|q| q.pending == 0 && q.in_flight == 0));
    }

    /// A failed batch goes back in front of later events
    #[tokio::test]
    async fn test_e2e_failed_batch_retried_in_order() {
        let downstream = Downstream::spawn().await;
        downstream.set_down(true);
        let relay = Relay::start(json!({
            "server": { "port": 8080 },
            "dispatch": { "flush_interval_secs": 1, "fail_on_error_status": true },
            "destinations": { "a": downstream.url("/a") }
        }))
        .await;

        let first = json!([event("A", Some("a")), event("B", Some("a"))]).to_string();
        assert_eq!(relay.post(&first).await.0, 200);
        relay.wait_until("a", |q| q.failed_attempts >= 1).await;

        let second = json!([event("C", Some("a"))]).to_string();
        assert_eq!(relay.post(&second).await.0, 200);
        relay
            .wait_until("a", |q| q.pending == 3 && q.in_flight == 0)
            .await;

        downstream.set_down(false);
        relay.wait_until("a", |q| q.delivered_total == 3).await;

        let accepted = downstream.accepted();
        assert_eq!(accepted.len(), 1);
        let kinds: Vec<&str> = accepted[0]
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["event"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["A", "B", "C"]);

        relay.stop().await;
    }

    /// Events without a deployment tag go to DEFAULT
    #[tokio::test]
    async fn test_e2e_default_routing() {
        let downstream = Downstream::spawn().await;
        let relay = Relay::start(json!({
            "server": { "port": 8080 },
            "destinations": {
                "DEFAULT": downstream.url("/default"),
                "ci-server": downstream.url("/ci")
            }
        }))
        .await;

        let body = json!([event("delivered", None), event("open", Some("ci-server"))]).to_string();
        assert_eq!(relay.post(&body).await.0, 200);

        relay.wait_until("DEFAULT", |q| q.delivered_total == 1).await;
        relay.wait_until("ci-server", |q| q.delivered_total == 1).await;

        let mut paths: Vec<String> = downstream.seen().into_iter().map(|s| s.path).collect();
        paths.sort();
        assert_eq!(paths, vec!["/ci", "/default"]);

        relay.stop().await;
    }

    /// An unknown destination refuses the whole request
    #[tokio::test]
    async fn test_e2e_unknown_destination_rejects_batch() {
        let downstream = Downstream::spawn().await;
        let relay = Relay::start(json!({
            "server": { "port": 8080 },
            "destinations": { "a": downstream.url("/a") }
        }))
        .await;

        let body = json!([event("open", Some("a")), event("open", Some("zzz"))]).to_string();
        let (status, text) = relay.post(&body).await;
        assert_eq!(status, 422);
        assert!(text.contains("zzz"));

        let a = relay.queue("a").await;
        assert_eq!(a.enqueued_total, 0);
        assert!(downstream.seen().is_empty());

        relay.stop().await;
    }

    /// A failing destination does not hold up the others
    #[tokio::test]
    async fn test_e2e_destinations_are_independent() {
        let healthy = Downstream::spawn().await;
        let broken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let broken_addr = broken.local_addr().unwrap();
        drop(broken);

        let relay = Relay::start(json!({
            "server": { "port": 8080 },
            "dispatch": { "flush_interval_secs": 1, "shutdown_grace_secs": 1 },
            "destinations": {
                "up": healthy.url("/up"),
                "down": format!("http://{broken_addr}/down")
            }
        }))
        .await;

        let body = json!([event("open", Some("down")), event("open", Some("up"))]).to_string();
        assert_eq!(relay.post(&body).await.0, 200);

        relay.wait_until("up", |q| q.delivered_total == 1).await;
        relay.wait_until("down", |q| q.failed_attempts >= 1).await;

        let remaining = relay.stop().await;
        let down = remaining.iter().find(|q| q.destination == "down").unwrap();
        assert_eq!(down.pending + down.in_flight, 1);
        assert_eq!(down.delivered_total, 0);
    }

    /// Malformed bodies are refused and nothing is forwarded
    #[tokio::test]
    async fn test_e2e_malformed_body() {
        let downstream = Downstream::spawn().await;
        let relay = Relay::start(json!({
            "server": { "port": 8080 },
            "destinations": { "a": downstream.url("/a") }
        }))
        .await;

        assert_eq!(relay.post("not json").await.0, 400);
        assert_eq!(relay.post(r#"{"event":"open"}"#).await.0, 400);
        assert!(downstream.seen().is_empty());

        relay.stop().await;
    }
}
