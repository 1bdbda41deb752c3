use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;

use jobexport_api::app::{build_app, AppServices};
use jobexport_core::JobId;
use jobexport_infra::config::HttpConfig;
use jobexport_infra::db::{InMemoryResultStore, InjectedFault};
use jobexport_infra::tx::RetryPolicy;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(store: InMemoryResultStore, export_dir: &Path) -> Self {
        Self::spawn_with_limit(store, export_dir, 0).await
    }

    async fn spawn_with_limit(
        store: InMemoryResultStore,
        export_dir: &Path,
        rate_limit_per_second: u32,
    ) -> Self {
        // Same router as prod, with fast backoff and an ephemeral port.
        let services = AppServices::in_memory(
            store,
            export_dir,
            RetryPolicy::exponential(3, Duration::from_millis(1)),
        );
        let http = HttpConfig {
            rate_limit_per_second,
            ..HttpConfig::default()
        };
        let app = build_app(services, &http);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self { base_url, handle }
    }

    fn export_url(&self, raw_job_id: &str) -> String {
        format!("{}/api/v1/jobs/{}/export", self.base_url, raw_job_id)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn artifact(dir: &Path, job_id: &str) -> PathBuf {
    dir.join(format!("{job_id}_result.json"))
}

fn seeded_store(job_id: &str, data: serde_json::Value) -> InMemoryResultStore {
    let store = InMemoryResultStore::new();
    store.insert(JobId::parse(job_id).unwrap(), data);
    store
}

#[tokio::test]
async fn health_is_ok_without_database() {
    let dir = tempfile::tempdir().unwrap();
    let srv = TestServer::spawn(InMemoryResultStore::new(), dir.path()).await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn export_writes_artifact_that_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let data = json!({"status": "success", "findings": ["vuln1"]});
    let srv = TestServer::spawn(seeded_store("scan-001", data.clone()), dir.path()).await;

    let res = reqwest::get(srv.export_url("scan-001")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!({"file": "scan-001_result.json"}));

    let written = std::fs::read_to_string(artifact(dir.path(), "scan-001")).unwrap();
    assert_eq!(serde_json::from_str::<serde_json::Value>(&written).unwrap(), data);
}

#[tokio::test]
async fn unknown_job_is_404_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let srv = TestServer::spawn(InMemoryResultStore::new(), dir.path()).await;

    let res = reqwest::get(srv.export_url("missing_job")).await.unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!({"error": "Job not found"}));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn malformed_ids_are_rejected_before_any_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let store = InMemoryResultStore::new();
    let srv = TestServer::spawn(store.clone(), dir.path()).await;
    let too_long = "a".repeat(65);

    let cases = [
        "bad$id",
        "has%20space",
        "%2E%2E%2Fetc%2Fpasswd",
        "dot.ted",
        "nul%00byte",
        "%FF%FE",
        too_long.as_str(),
    ];

    let client = reqwest::Client::new();
    for raw in cases {
        let res = client.get(srv.export_url(raw)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "case {raw}");
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body, json!({"error": "Invalid job_id format"}), "case {raw}");
    }

    assert_eq!(store.stats().begun, 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn boundary_length_id_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let id = "b".repeat(64);
    let srv = TestServer::spawn(seeded_store(&id, json!({"ok": true})), dir.path()).await;

    let res = reqwest::get(srv.export_url(&id)).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(artifact(dir.path(), &id).exists());
}

#[tokio::test]
async fn repeated_exports_produce_identical_files() {
    let dir = tempfile::tempdir().unwrap();
    let srv = TestServer::spawn(
        seeded_store("again", json!({"status": "success", "findings": []})),
        dir.path(),
    )
    .await;
    let client = reqwest::Client::new();

    let first = client.get(srv.export_url("again")).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_bytes = std::fs::read(artifact(dir.path(), "again")).unwrap();

    let second = client.get(srv.export_url("again")).send().await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_bytes = std::fs::read(artifact(dir.path(), "again")).unwrap();

    assert_eq!(first_bytes, second_bytes);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fifty_concurrent_requests_for_one_job_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let data = json!({"status": "success", "findings": ["vuln1", "vuln2"]});
    let store = seeded_store("busy", data.clone());
    let srv = TestServer::spawn(store.clone(), dir.path()).await;
    let client = reqwest::Client::new();

    let requests: Vec<_> = (0..50)
        .map(|_| {
            let client = client.clone();
            let url = srv.export_url("busy");
            tokio::spawn(async move { client.get(url).send().await.unwrap().status() })
        })
        .collect();

    for request in requests {
        assert_eq!(request.await.unwrap(), StatusCode::OK);
    }

    let written = std::fs::read_to_string(artifact(dir.path(), "busy")).unwrap();
    assert_eq!(serde_json::from_str::<serde_json::Value>(&written).unwrap(), data);
    // Only the final artifact; no temp files left behind.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    assert_eq!(store.available_connections(), store.capacity());
}

#[tokio::test]
async fn transient_failures_are_retried_transparently() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store("flaky", json!({"n": 7}));
    store.fail_next_reads(2, InjectedFault::Deadlock);
    let srv = TestServer::spawn(store.clone(), dir.path()).await;

    let res = reqwest::get(srv.export_url("flaky")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(store.stats().begun, 3);
}

#[tokio::test]
async fn persistent_transient_failure_is_a_generic_500() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store("down", json!({"n": 7}));
    store.fail_next_reads(10, InjectedFault::ConnectionRefused);
    let srv = TestServer::spawn(store.clone(), dir.path()).await;

    let res = reqwest::get(srv.export_url("down")).await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!({"error": "Internal server error"}));
    assert_eq!(store.stats().begun, 4);
    assert!(!artifact(dir.path(), "down").exists());
}

#[tokio::test]
async fn write_failure_is_500_without_detail() {
    let dir = tempfile::tempdir().unwrap();
    let not_a_dir = dir.path().join("exports");
    std::fs::write(&not_a_dir, "").unwrap();
    let store = seeded_store("denied", json!({"n": 1}));
    let srv = TestServer::spawn(store.clone(), &not_a_dir).await;

    let res = reqwest::get(srv.export_url("denied")).await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = res.text().await.unwrap();
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&text).unwrap(),
        json!({"error": "Internal server error"})
    );
    assert!(!text.contains("exports"));

    let stats = store.stats();
    assert_eq!(stats.begun, 1);
    assert_eq!(stats.rolled_back, 1);
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let dir = tempfile::tempdir().unwrap();
    let srv = TestServer::spawn(InMemoryResultStore::new(), dir.path()).await;

    let res = reqwest::get(format!("{}/api/v1/nope", srv.base_url)).await.unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!({"error": "Not found"}));
}

#[tokio::test]
async fn security_headers_are_set_on_every_response() {
    let dir = tempfile::tempdir().unwrap();
    let srv = TestServer::spawn(InMemoryResultStore::new(), dir.path()).await;
    let client = reqwest::Client::new();

    for url in [
        format!("{}/health", srv.base_url),
        srv.export_url("bad$id"),
        format!("{}/nowhere", srv.base_url),
    ] {
        let res = client.get(&url).send().await.unwrap();
        let headers = res.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff", "{url}");
        assert_eq!(headers["x-frame-options"], "SAMEORIGIN", "{url}");
        assert_eq!(headers["referrer-policy"], "no-referrer", "{url}");
        assert_eq!(headers["content-security-policy"], "default-src 'self'", "{url}");
        assert!(headers.contains_key("strict-transport-security"), "{url}");
    }
}

#[tokio::test]
async fn clients_over_the_limit_get_429() {
    let dir = tempfile::tempdir().unwrap();
    let srv = TestServer::spawn_with_limit(InMemoryResultStore::new(), dir.path(), 2).await;
    let client = reqwest::Client::new();
    let url = format!("{}/health", srv.base_url);

    assert_eq!(client.get(&url).send().await.unwrap().status(), StatusCode::OK);
    assert_eq!(client.get(&url).send().await.unwrap().status(), StatusCode::OK);

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().contains_key("retry-after"));
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({"error": "Too many requests, please try again later."})
    );
}
