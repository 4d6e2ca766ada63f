//! ScanRelay Daemon Binary
//!
//! Connects to every registered barcode scanner, persists their records
//! as XML fragments, and serves the registry plus the latest records
//! over a small HTTP API.
//!
//! # Usage
//!
//! ```bash
//! scanrelayd --port 3000
//! scanrelayd --port 3000 --storage-root /var/lib/scanrelay
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use scanrelay::http::{build_router, AppState};
use scanrelay::ingest::IngestSupervisor;
use scanrelay::registry::ScannerRegistry;
use scanrelay::snapshot::{self, RecordSnapshot};
use scanrelay::store::FileStore;
use scanrelay::watcher::StoreWatcher;

/// ScanRelay Ingestion Daemon
#[derive(Parser, Debug)]
#[command(name = "scanrelayd")]
#[command(about = "Warehouse barcode scanner ingestion daemon")]
struct Args {
    /// Port for the HTTP API
    #[arg(short, long, default_value = "3000", env = "SCANRELAY_HTTP_PORT")]
    port: u16,

    /// Host to bind the HTTP API to
    #[arg(long, default_value = "127.0.0.1", env = "SCANRELAY_HTTP_HOST")]
    host: String,

    /// Directory that receives per-scanner record files
    #[arg(long, default_value = "./scan-data", env = "SCANRELAY_STORAGE_ROOT")]
    storage_root: PathBuf,

    /// Path of the scanner registry JSON file
    #[arg(
        long,
        default_value = "./config/scanners.json",
        env = "SCANRELAY_REGISTRY_FILE"
    )]
    registry_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scanrelay=info".parse().unwrap())
                .add_directive("scanrelayd=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    std::fs::create_dir_all(&args.storage_root)?;

    // Load the persisted registry and wire up the pipeline
    let registry = Arc::new(ScannerRegistry::load(&args.registry_file)?);
    let store = FileStore::new(&args.storage_root);
    let snapshot = RecordSnapshot::new();
    let supervisor = Arc::new(IngestSupervisor::new(store.clone()));

    tracing::info!(
        "Loaded {} scanner(s) from {}",
        registry.len(),
        args.registry_file.display()
    );

    // Open a connection for every registered scanner
    supervisor.start_all(&registry.list());

    // Prime the snapshot, then keep it fresh from storage changes
    snapshot::refresh_all(&registry, &store, &snapshot);
    let store_watcher = StoreWatcher::new(args.storage_root.clone());
    let watcher_handle = {
        let registry = Arc::clone(&registry);
        let store = store.clone();
        let snapshot = snapshot.clone();
        store_watcher.start(move || {
            snapshot::refresh_all(&registry, &store, &snapshot);
        })?
    };

    let state = AppState {
        registry,
        store,
        snapshot,
        supervisor: Arc::clone(&supervisor),
    };
    let app = build_router(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("ScanRelay daemon listening on http://{}", addr);
    tracing::info!("Storing records under {}", args.storage_root.display());

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await?;

    tracing::info!("Shutting down, closing scanner connections");
    supervisor.shutdown().await;
    watcher_handle.stop();

    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
