//! Storage tree watcher
//!
//! Uses the `notify` crate to watch the record storage root and trigger
//! snapshot refreshes when record files change. Events are debounced
//! (100ms window to batch rapid appends) and filtered to record files, so
//! an external edit and a burst of live appends both collapse into one
//! refresh. Duplicate or coalesced notifications are harmless because the
//! refresh re-reads the latest file for every scanner.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};

use crate::error::Result;
use crate::store::RECORD_FILE_EXT;

/// Configuration for the storage watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration (default: 100ms)
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(100),
        }
    }
}

/// Watches the storage root for record file changes
pub struct StoreWatcher {
    /// Storage root path
    root: PathBuf,
    /// Watcher configuration
    config: WatcherConfig,
    /// Whether the watcher is running
    running: Arc<AtomicBool>,
}

impl StoreWatcher {
    /// Create a new watcher for a storage root
    pub fn new(root: PathBuf) -> Self {
        Self::with_config(root, WatcherConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(root: PathBuf, config: WatcherConfig) -> Self {
        Self {
            root,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if the watcher is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start watching for record file changes.
    ///
    /// Spawns a background thread that receives debounced filesystem
    /// events and invokes `on_change` whenever any record file under the
    /// root was touched. The returned handle stops the watcher when
    /// dropped.
    ///
    /// Calling `start` on an already running watcher logs a warning and
    /// returns a fresh handle; the original callback stays in effect and
    /// the new one is dropped.
    pub fn start<F>(&self, on_change: F) -> Result<WatcherHandle>
    where
        F: Fn() + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Watcher already running, keeping the original callback");
            return Ok(WatcherHandle {
                running: Arc::clone(&self.running),
            });
        }

        // The watch target must exist before subscribing
        std::fs::create_dir_all(&self.root)?;

        let running = Arc::clone(&self.running);

        // Channel for receiving debounced events
        let (tx, rx) = std::sync::mpsc::channel();

        // Create debounced watcher
        let mut debouncer = new_debouncer(self.config.debounce_duration, tx).map_err(|e| {
            crate::error::ScanRelayError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                e.to_string(),
            ))
        })?;

        // Start watching
        debouncer
            .watcher()
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| {
                crate::error::ScanRelayError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    e.to_string(),
                ))
            })?;

        // Spawn processing thread
        let handle_running = Arc::clone(&running);
        std::thread::spawn(move || {
            while handle_running.load(Ordering::SeqCst) {
                // Receive events with timeout so the stop flag stays responsive
                match rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(Ok(events)) => {
                        let record_changes = events
                            .iter()
                            .filter(|event| {
                                matches!(event.kind, DebouncedEventKind::Any)
                                    && Self::is_record_file(&event.path)
                            })
                            .count();
                        if record_changes > 0 {
                            tracing::debug!(
                                changes = record_changes,
                                "Record files changed, refreshing"
                            );
                            on_change();
                        }
                    }
                    Ok(Err(e)) => {
                        tracing::error!("Watcher error: {:?}", e);
                    }
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                        // No events, continue loop
                    }
                    Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                        // Channel closed, exit
                        break;
                    }
                }
            }

            // Keep debouncer alive until thread exits
            drop(debouncer);
        });

        Ok(WatcherHandle { running })
    }

    /// Stop watching for record file changes
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if a path is a record fragment file
    fn is_record_file(path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some(RECORD_FILE_EXT)
    }
}

/// Handle for controlling a running watcher
pub struct WatcherHandle {
    running: Arc<AtomicBool>,
}

impl WatcherHandle {
    /// Stop the watcher
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the watcher is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
