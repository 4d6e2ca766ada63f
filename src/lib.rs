//! ScanRelay: warehouse barcode scanner ingestion service
//!
//! This library collects barcode and annotation records from networked
//! barcode scanners over TCP and stores them as XML fragments on disk,
//! one directory per scanner, one file per day. A small HTTP API manages
//! the scanner registry and serves the latest parsed records back to
//! admin tooling.
//!
//! # Pipeline
//!
//! - [`registry`] holds the configured scanners, persisted as JSON
//! - [`ingest`] dials each scanner and reads its byte stream
//! - [`framer`] accumulates chunks until a record is complete
//! - [`codec`] converts records to and from their XML fragment form
//! - [`store`] appends fragments under `<root>/<scanner>/<date>.xml`
//! - [`watcher`] re-parses the latest files whenever storage changes
//! - [`http`] exposes the registry and the latest records
//!
//! # Example
//!
//! ```ignore
//! use scanrelay::codec;
//! use scanrelay::framer::StreamFramer;
//!
//! let mut framer = StreamFramer::new();
//! assert_eq!(framer.feed(b"12345"), None);
//! let complete = framer.feed(b"67890").unwrap();
//!
//! let record = scanrelay::record::Record::barcode(complete);
//! let fragment = codec::serialize(&record);
//! assert_eq!(codec::parse(&fragment)?, vec![record]);
//! ```

pub mod codec;
pub mod error;
pub mod framer;
pub mod fs_utils;
pub mod http;
pub mod ingest;
pub mod record;
pub mod registry;
pub mod snapshot;
pub mod store;
pub mod watcher;

// Re-export commonly used types
pub use error::{Result, ScanRelayError};
pub use framer::{CompletionPolicy, MinLengthPolicy, StreamFramer};
pub use http::{build_router, AppState};
pub use ingest::IngestSupervisor;
pub use record::{AnnotationRecord, Record};
pub use registry::{ScannerDescriptor, ScannerRegistry};
pub use snapshot::RecordSnapshot;
pub use store::FileStore;
pub use watcher::{StoreWatcher, WatcherConfig, WatcherHandle};
