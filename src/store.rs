//! Per-scanner record storage
//!
//! Records live under `<root>/<scannerName>/<YYYY-MM-DD>.xml`, one file per
//! scanner per day, each file an append-only sequence of XML fragments.
//! Appends happen from exactly one connection task per scanner; reads may
//! happen concurrently and always see whole fragments because an append is
//! a single write-to-end-of-file.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::codec;
use crate::error::{Result, ScanRelayError};
use crate::record::Record;

/// Extension of record fragment files.
pub const RECORD_FILE_EXT: &str = "xml";

/// Append-only file store rooted at a storage directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Append one serialized record to today's file for this scanner.
    ///
    /// Creates the scanner directory and the day file as needed. Returns
    /// the path written so callers can log it.
    pub fn append(&self, scanner_name: &str, record: &Record) -> Result<PathBuf> {
        let dir = self.root.join(scanner_name);
        fs::create_dir_all(&dir).map_err(|e| ScanRelayError::storage(&dir, e))?;

        let path = dir.join(Self::day_file_name());
        let fragment = codec::serialize(record);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ScanRelayError::storage(&path, e))?;
        file.write_all(fragment.as_bytes())
            .map_err(|e| ScanRelayError::storage(&path, e))?;
        Ok(path)
    }

    /// Parse the most recently modified record file for this scanner.
    ///
    /// An absent or empty scanner directory yields an empty list, never an
    /// error. Ties on modification time break toward the greater file name,
    /// which for date-stamped names is the later day.
    pub fn latest(&self, scanner_name: &str) -> Result<Vec<Record>> {
        let dir = self.root.join(scanner_name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ScanRelayError::storage(&dir, e)),
        };

        let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
        for entry in entries {
            let entry = entry.map_err(|e| ScanRelayError::storage(&dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_FILE_EXT) {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(|e| ScanRelayError::storage(&path, e))?;
            let candidate = (modified, path);
            newest = match newest {
                Some(current) if current >= candidate => Some(current),
                _ => Some(candidate),
            };
        }

        let Some((_, path)) = newest else {
            return Ok(Vec::new());
        };
        let raw = fs::read_to_string(&path).map_err(|e| ScanRelayError::storage(&path, e))?;
        codec::parse(&raw)
    }

    fn day_file_name() -> String {
        format!("{}.{}", Local::now().format("%Y-%m-%d"), RECORD_FILE_EXT)
    }
}
