//! Scanner ingestion pipeline
//!
//! Maintains one live TCP connection per registered scanner and turns each
//! connection's raw byte stream into persisted records.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   IngestSupervisor                           │
//! │                                                              │
//! │  scanner name ──► ConnectionHandle { cancel, task }          │
//! │                                                              │
//! │  each task:  dial host:port ──► read bytes ──► StreamFramer  │
//! │              ──► completed barcode ──► codec ──► FileStore   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Registry changes drive the connection set: a registered scanner gets a
//! task, a removed scanner has its task cancelled. Failures inside one
//! scanner's task never touch another scanner's task.

mod connection;
mod supervisor;

pub use supervisor::IngestSupervisor;
