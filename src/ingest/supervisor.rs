//! Connection supervision
//!
//! Tracks one connection task per scanner, keyed by case-insensitive name.
//! The API layer drives it on registry changes; startup seeds it from the
//! loaded descriptor set.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::registry::ScannerDescriptor;
use crate::store::FileStore;

use super::connection::run_connection;

/// Running connection task for one scanner
struct ConnectionHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Supervises the set of live scanner connections
pub struct IngestSupervisor {
    store: FileStore,
    connections: Mutex<HashMap<String, ConnectionHandle>>,
}

impl IngestSupervisor {
    pub fn new(store: FileStore) -> Self {
        Self {
            store,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Open a connection per descriptor, best-effort.
    ///
    /// Dial failures are handled inside each task; none of them block or
    /// fail startup.
    pub fn start_all(&self, descriptors: &[ScannerDescriptor]) {
        for descriptor in descriptors {
            self.connect(descriptor.clone());
        }
    }

    /// Spawn the connection task for one scanner.
    ///
    /// An existing task under the same name is cancelled and replaced.
    pub fn connect(&self, descriptor: ScannerDescriptor) {
        let key = descriptor.name.to_lowercase();
        tracing::info!(scanner = %descriptor.name, "Opening scanner connection");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_connection(
            descriptor,
            self.store.clone(),
            cancel.clone(),
        ));

        let replaced = self
            .connections
            .lock()
            .insert(key, ConnectionHandle { cancel, task });
        if let Some(old) = replaced {
            old.cancel.cancel();
        }
    }

    /// Cancel and await the connection task for one scanner.
    ///
    /// A blocked read observes the cancellation promptly; any partial
    /// accumulation buffer is discarded with the task.
    pub async fn disconnect(&self, name: &str) {
        let handle = self.connections.lock().remove(&name.to_lowercase());
        let Some(handle) = handle else {
            return;
        };

        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            tracing::warn!(scanner = %name, error = %e, "Connection task ended abnormally");
        }
        tracing::info!(scanner = %name, "Scanner connection closed");
    }

    /// Cancel every connection task and await them all.
    pub async fn shutdown(&self) {
        let handles: Vec<(String, ConnectionHandle)> =
            self.connections.lock().drain().collect();
        for (name, handle) in handles {
            handle.cancel.cancel();
            if let Err(e) = handle.task.await {
                tracing::warn!(scanner = %name, error = %e, "Connection task ended abnormally");
            }
        }
    }

    /// Number of tracked connection tasks still running.
    pub fn connection_count(&self) -> usize {
        self.prune_finished();
        self.connections.lock().len()
    }

    /// Whether a live task exists for this scanner name.
    pub fn is_connected(&self, name: &str) -> bool {
        self.prune_finished();
        self.connections.lock().contains_key(&name.to_lowercase())
    }

    /// Drop handles whose tasks already ended (retry budget exhausted).
    fn prune_finished(&self) {
        self.connections
            .lock()
            .retain(|_, handle| !handle.task.is_finished());
    }
}
