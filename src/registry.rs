//! Scanner registry
//!
//! Owns the set of registered scanner descriptors. The set is held behind a
//! read-write lock and mirrored to a JSON file: every mutation persists the
//! full descriptor array (write-temp-then-rename) while still holding the
//! write lock, so readers never observe state the durable file does not
//! have. Name comparisons are case-insensitive for uniqueness, lookup, and
//! sort order.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanRelayError};
use crate::fs_utils::atomic_rename;

/// Network endpoint for one registered scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerDescriptor {
    pub name: String,
    pub host: String,
    pub port: u16,
}

/// Registry of scanner descriptors, persisted as a JSON array.
pub struct ScannerRegistry {
    scanners: RwLock<Vec<ScannerDescriptor>>,
    path: PathBuf,
}

impl ScannerRegistry {
    /// Load the registry from its backing file.
    ///
    /// A missing file is an empty registry; an unreadable or invalid file
    /// is an error, since starting with a silently empty set would orphan
    /// every previously registered scanner.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let scanners = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| ScanRelayError::InvalidRegistry {
                path: path.display().to_string(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(ScanRelayError::InvalidRegistry {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })
            }
        };
        Ok(Self {
            scanners: RwLock::new(scanners),
            path,
        })
    }

    /// All descriptors, sorted by case-insensitive name ascending.
    pub fn list(&self) -> Vec<ScannerDescriptor> {
        let mut scanners = self.scanners.read().clone();
        scanners.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        scanners
    }

    /// Number of registered scanners.
    pub fn len(&self) -> usize {
        self.scanners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scanners.read().is_empty()
    }

    /// Whether a scanner with this name is registered (case-insensitive).
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The descriptor registered under this name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<ScannerDescriptor> {
        let wanted = name.to_lowercase();
        self.scanners
            .read()
            .iter()
            .find(|d| d.name.to_lowercase() == wanted)
            .cloned()
    }

    /// Register a new scanner.
    ///
    /// Fails with `DuplicateScanner` if a descriptor with the same
    /// case-insensitive name already exists; the set is unchanged on any
    /// failure, including a failed persistence write.
    pub fn add(&self, descriptor: ScannerDescriptor) -> Result<()> {
        let mut scanners = self.scanners.write();
        let wanted = descriptor.name.to_lowercase();
        if scanners.iter().any(|d| d.name.to_lowercase() == wanted) {
            return Err(ScanRelayError::DuplicateScanner {
                name: descriptor.name,
            });
        }

        let mut updated = scanners.clone();
        updated.push(descriptor);
        self.persist(&updated)?;
        *scanners = updated;
        Ok(())
    }

    /// Remove a scanner by name (case-insensitive).
    ///
    /// Returns whether a descriptor was removed; removing an absent name is
    /// not an error.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let mut scanners = self.scanners.write();
        let wanted = name.to_lowercase();
        let mut updated = scanners.clone();
        let before = updated.len();
        updated.retain(|d| d.name.to_lowercase() != wanted);
        if updated.len() == before {
            return Ok(false);
        }

        self.persist(&updated)?;
        *scanners = updated;
        Ok(true)
    }

    /// Write the full descriptor array, atomically replacing the file.
    fn persist(&self, scanners: &[ScannerDescriptor]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ScanRelayError::storage(parent, e))?;
            }
        }

        let json = serde_json::to_string_pretty(scanners).map_err(|e| {
            ScanRelayError::storage(
                &self.path,
                io::Error::new(io::ErrorKind::Other, e.to_string()),
            )
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| ScanRelayError::storage(&tmp, e))?;
        atomic_rename(&tmp, &self.path).map_err(|e| ScanRelayError::storage(&self.path, e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
