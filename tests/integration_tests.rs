//! Integration tests for scanrelay
//!
//! These tests verify end-to-end behavior across multiple modules: the
//! HTTP API, the ingestion supervisor, storage, and the snapshot cache.
//! Scanners are simulated with plain TCP listeners that write raw bytes.
//!
//! ## Running Integration Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test --test integration_tests
//!
//! # Run a specific scenario
//! cargo test --test integration_tests test_end_to_end_single_barcode
//! cargo test --test integration_tests test_remove_mid_stream
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use scanrelay::http::{build_router, AppState};
use scanrelay::ingest::IngestSupervisor;
use scanrelay::record::Record;
use scanrelay::registry::{ScannerDescriptor, ScannerRegistry};
use scanrelay::snapshot::{self, RecordSnapshot};
use scanrelay::store::FileStore;
use scanrelay::watcher::StoreWatcher;

// ============================================================================
// TEST FIXTURE UTILITIES
// ============================================================================

/// A full pipeline wired against a temporary directory
struct TestRig {
    dir: TempDir,
    registry: Arc<ScannerRegistry>,
    store: FileStore,
    snapshot: RecordSnapshot,
    supervisor: Arc<IngestSupervisor>,
}

impl TestRig {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let registry = Arc::new(
            ScannerRegistry::load(dir.path().join("config").join("scanners.json"))
                .expect("Failed to load empty registry"),
        );
        let store = FileStore::new(dir.path().join("data"));
        let snapshot = RecordSnapshot::new();
        let supervisor = Arc::new(IngestSupervisor::new(store.clone()));
        Self {
            dir,
            registry,
            store,
            snapshot,
            supervisor,
        }
    }

    fn state(&self) -> AppState {
        AppState {
            registry: Arc::clone(&self.registry),
            store: self.store.clone(),
            snapshot: self.snapshot.clone(),
            supervisor: Arc::clone(&self.supervisor),
        }
    }

    /// Serve the HTTP API on an ephemeral port.
    async fn serve_http(&self) -> SocketAddr {
        let app = build_router(self.state());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
        addr
    }

    /// Path where today's records for `scanner` land.
    fn day_file(&self, scanner: &str) -> PathBuf {
        self.dir
            .path()
            .join("data")
            .join(scanner)
            .join(format!("{}.xml", Local::now().format("%Y-%m-%d")))
    }
}

/// Send a bare HTTP/1.1 request and return (status, body).
async fn send_json(
    addr: SocketAddr,
    method: &str,
    path: &str,
    body: Option<&Value>,
) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    if let Some(body) = body {
        let payload = body.to_string();
        req.push_str("Content-Type: application/json\r\n");
        req.push_str(&format!("Content-Length: {}\r\n\r\n", payload.len()));
        req.push_str(&payload);
    } else {
        req.push_str("\r\n");
    }
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    (status, body.to_string())
}

/// Poll `condition` until it holds or five seconds pass.
async fn wait_for(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {what}");
}

fn descriptor_json(name: &str, port: u16) -> Value {
    json!({ "name": name, "host": "127.0.0.1", "port": port })
}

// ============================================================================
// END-TO-END SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_end_to_end_single_barcode() {
    let rig = TestRig::new();
    let addr = rig.serve_http().await;

    // Fake scanner: emit one complete barcode, then hold the socket open.
    let scanner = TcpListener::bind("127.0.0.1:0").await.expect("bind scanner");
    let scanner_port = scanner.local_addr().expect("scanner addr").port();
    tokio::spawn(async move {
        let (mut socket, _) = scanner.accept().await.expect("accept");
        socket.write_all(b"1234567890").await.expect("write barcode");
        let mut sink = Vec::new();
        let _ = socket.read_to_end(&mut sink).await;
    });

    let (status, body) =
        send_json(addr, "POST", "/config", Some(&descriptor_json("S1", scanner_port))).await;
    assert_eq!(status, 200, "registration failed: {body}");

    // The barcode must land in today's file for S1 as one XML fragment.
    let day_file = rig.day_file("S1");
    wait_for("barcode file to appear", || day_file.exists()).await;
    let content = std::fs::read_to_string(&day_file).expect("read day file");
    assert_eq!(
        content,
        "<BarcodeData><Barcode>1234567890</Barcode></BarcodeData>"
    );
    assert_eq!(
        rig.store.latest("S1").expect("latest records"),
        vec![Record::barcode("1234567890")]
    );

    // And the HTTP retrieval endpoint must serve it back, parsed.
    let (status, body) = send_json(
        addr,
        "POST",
        "/selected-scanners",
        Some(&json!({ "selectedScanners": ["S1"] })),
    )
    .await;
    assert_eq!(status, 200);
    let results: Value = serde_json::from_str(&body).expect("results json");
    assert_eq!(
        results,
        json!([{
            "scanner": "S1",
            "xmlData": [{ "type": "barcode", "value": "1234567890" }]
        }])
    );
}

#[tokio::test]
async fn test_remove_mid_stream_drops_partial_buffer() {
    let rig = TestRig::new();
    let addr = rig.serve_http().await;

    // Fake scanner: emit four characters (under the completion threshold),
    // signal, then wait for the daemon to hang up.
    let scanner = TcpListener::bind("127.0.0.1:0").await.expect("bind scanner");
    let scanner_port = scanner.local_addr().expect("scanner addr").port();
    let (wrote_tx, wrote_rx) = tokio::sync::oneshot::channel();
    let scanner_task = tokio::spawn(async move {
        let (mut socket, _) = scanner.accept().await.expect("accept");
        socket.write_all(b"1234").await.expect("write partial");
        wrote_tx.send(()).expect("signal partial write");
        let mut sink = Vec::new();
        socket.read_to_end(&mut sink).await.expect("read to close");
        sink
    });

    let (status, _) =
        send_json(addr, "POST", "/config", Some(&descriptor_json("S1", scanner_port))).await;
    assert_eq!(status, 200);

    wrote_rx.await.expect("scanner wrote partial data");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (status, body) =
        send_json(addr, "POST", "/remove", Some(&json!({ "name": "S1" }))).await;
    assert_eq!(status, 200);
    let response: Value = serde_json::from_str(&body).expect("remove json");
    assert_eq!(response, json!({ "removed": true }));

    // The partial buffer is discarded, so no record file exists at all.
    assert!(!rig.dir.path().join("data").join("S1").exists());
    assert_eq!(rig.supervisor.connection_count(), 0);

    // The scanner side observes a clean close, with nothing written back.
    let sink = tokio::time::timeout(Duration::from_secs(5), scanner_task)
        .await
        .expect("connection should close promptly")
        .expect("scanner task");
    assert!(sink.is_empty());
}

// ============================================================================
// HTTP API
// ============================================================================

#[tokio::test]
async fn test_healthz_ok() {
    let rig = TestRig::new();
    let addr = rig.serve_http().await;

    let (status, body) = send_json(addr, "GET", "/healthz", None).await;
    assert_eq!(status, 200);
    let json: Value = serde_json::from_str(&body).expect("healthz json");
    assert_eq!(json, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_config_roundtrip_http() {
    let rig = TestRig::new();
    let addr = rig.serve_http().await;

    let (status, body) = send_json(addr, "GET", "/config", None).await;
    assert_eq!(status, 200);
    assert_eq!(body.trim(), "[]");

    let (status, body) =
        send_json(addr, "POST", "/config", Some(&descriptor_json("Dock-A", 1))).await;
    assert_eq!(status, 200);
    let echoed: Value = serde_json::from_str(&body).expect("descriptor json");
    assert_eq!(echoed, descriptor_json("Dock-A", 1));

    let (status, body) = send_json(addr, "GET", "/config", None).await;
    assert_eq!(status, 200);
    let listed: Value = serde_json::from_str(&body).expect("config json");
    assert_eq!(listed, json!([descriptor_json("Dock-A", 1)]));
}

#[tokio::test]
async fn test_duplicate_registration_conflict() {
    let rig = TestRig::new();
    let addr = rig.serve_http().await;

    let (status, _) = send_json(addr, "POST", "/config", Some(&descriptor_json("S1", 1))).await;
    assert_eq!(status, 200);

    // Same name in a different case is still a duplicate.
    let (status, body) =
        send_json(addr, "POST", "/config", Some(&descriptor_json("s1", 2))).await;
    assert_eq!(status, 409);
    let error: Value = serde_json::from_str(&body).expect("error json");
    assert_eq!(
        error.get("error").and_then(Value::as_str),
        Some("scanner 's1' is already registered")
    );

    let (_, body) = send_json(addr, "GET", "/config", None).await;
    let listed: Value = serde_json::from_str(&body).expect("config json");
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_rejects_blank_scanner_name() {
    let rig = TestRig::new();
    let addr = rig.serve_http().await;

    let (status, _) = send_json(addr, "POST", "/config", Some(&descriptor_json("   ", 1))).await;
    assert_eq!(status, 400);
    assert!(rig.registry.is_empty());
}

#[tokio::test]
async fn test_remove_unknown_scanner_reports_false() {
    let rig = TestRig::new();
    let addr = rig.serve_http().await;

    let (status, body) =
        send_json(addr, "POST", "/remove", Some(&json!({ "name": "ghost" }))).await;
    assert_eq!(status, 200);
    let response: Value = serde_json::from_str(&body).expect("remove json");
    assert_eq!(response, json!({ "removed": false }));
}

#[tokio::test]
async fn test_selected_scanners_skips_unknown() {
    let rig = TestRig::new();
    rig.registry
        .add(ScannerDescriptor {
            name: "Alpha".to_string(),
            host: "127.0.0.1".to_string(),
            port: 1,
        })
        .expect("add scanner");
    rig.store
        .append("Alpha", &Record::barcode("ALPHA12345"))
        .expect("append record");
    let addr = rig.serve_http().await;

    // Unknown names are skipped; known names resolve case-insensitively
    // and report the canonical casing.
    let (status, body) = send_json(
        addr,
        "POST",
        "/selected-scanners",
        Some(&json!({ "selectedScanners": ["ghost", "alpha"] })),
    )
    .await;
    assert_eq!(status, 200);
    let results: Value = serde_json::from_str(&body).expect("results json");
    assert_eq!(
        results,
        json!([{
            "scanner": "Alpha",
            "xmlData": [{ "type": "barcode", "value": "ALPHA12345" }]
        }])
    );
}

// ============================================================================
// PERSISTENCE AND SNAPSHOT REFRESH
// ============================================================================

#[tokio::test]
async fn test_registry_survives_restart() {
    let rig = TestRig::new();
    let addr = rig.serve_http().await;

    for name in ["beta", "Alpha"] {
        let (status, _) =
            send_json(addr, "POST", "/config", Some(&descriptor_json(name, 1))).await;
        assert_eq!(status, 200);
    }

    // A fresh registry instance sees both descriptors, sorted by name.
    let reloaded = ScannerRegistry::load(rig.registry.path()).expect("reload registry");
    let names: Vec<String> = reloaded.list().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["Alpha", "beta"]);
}

#[tokio::test]
async fn test_watcher_refreshes_snapshot() {
    let rig = TestRig::new();
    rig.registry
        .add(ScannerDescriptor {
            name: "S1".to_string(),
            host: "127.0.0.1".to_string(),
            port: 1,
        })
        .expect("add scanner");

    let store_watcher = StoreWatcher::new(rig.dir.path().join("data"));
    let handle = {
        let registry = Arc::clone(&rig.registry);
        let store = rig.store.clone();
        let snapshot = rig.snapshot.clone();
        store_watcher
            .start(move || snapshot::refresh_all(&registry, &store, &snapshot))
            .expect("start watcher")
    };

    rig.store
        .append("S1", &Record::barcode("ABCDEFGHIJ"))
        .expect("append record");

    let snapshot = rig.snapshot.clone();
    wait_for("snapshot to pick up the new record", || {
        snapshot.get("S1") == Some(vec![Record::barcode("ABCDEFGHIJ")])
    })
    .await;

    handle.stop();
}
