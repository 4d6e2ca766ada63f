//! Latest-record snapshot
//!
//! Holds the most recent parsed records per scanner, published by the
//! storage watcher's refresh and read by the HTTP layer. The map is
//! replaced entry-by-entry; a refresh is idempotent, so running it more
//! often than strictly necessary is safe.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::record::Record;
use crate::registry::ScannerRegistry;
use crate::store::FileStore;

/// Shared map of scanner name to its latest parsed records.
#[derive(Debug, Clone, Default)]
pub struct RecordSnapshot {
    inner: Arc<RwLock<HashMap<String, Vec<Record>>>>,
}

impl RecordSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the records held for one scanner.
    pub fn publish(&self, scanner_name: &str, records: Vec<Record>) {
        self.inner.write().insert(scanner_name.to_string(), records);
    }

    /// The latest published records for one scanner, if any refresh has
    /// covered it yet.
    pub fn get(&self, scanner_name: &str) -> Option<Vec<Record>> {
        self.inner.read().get(scanner_name).cloned()
    }

    /// Drop a scanner's entry after it is unregistered (case-insensitive,
    /// to match registry name semantics).
    pub fn remove(&self, scanner_name: &str) {
        let wanted = scanner_name.to_lowercase();
        self.inner.write().retain(|name, _| name.to_lowercase() != wanted);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

/// Re-read the latest file for every registered scanner and publish the
/// results.
///
/// Failures are per-scanner: a malformed or unreadable file logs a warning
/// and publishes an empty list for that scanner, leaving the others
/// untouched.
pub fn refresh_all(registry: &ScannerRegistry, store: &FileStore, snapshot: &RecordSnapshot) {
    for descriptor in registry.list() {
        match store.latest(&descriptor.name) {
            Ok(records) => {
                tracing::debug!(
                    scanner = %descriptor.name,
                    records = records.len(),
                    "Refreshed latest records"
                );
                snapshot.publish(&descriptor.name, records);
            }
            Err(e) => {
                tracing::warn!(
                    scanner = %descriptor.name,
                    error = %e,
                    "Failed to refresh latest records"
                );
                snapshot.publish(&descriptor.name, Vec::new());
            }
        }
    }
}
