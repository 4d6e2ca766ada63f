//! Per-scanner connection task
//!
//! Dials out to one scanner endpoint and pumps its byte stream through the
//! framer into the file store. Connection trouble is retried with bounded
//! exponential backoff; cancellation (scanner removed, daemon shutdown)
//! interrupts a blocked read promptly and discards any partial buffer.

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, ScanRelayError};
use crate::framer::StreamFramer;
use crate::record::Record;
use crate::registry::ScannerDescriptor;
use crate::store::FileStore;

/// Delay before the first reconnect attempt.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Ceiling for the reconnect delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);
/// Unproductive attempts per outage before the scanner is marked dead.
const MAX_ATTEMPTS: u32 = 5;

const READ_BUFFER_SIZE: usize = 4096;

/// Outcome of one read session on an established connection.
enum ReadOutcome {
    /// The cancellation token fired.
    Cancelled,
    /// The socket closed or failed; `read_any` is whether any bytes arrived
    /// during the session.
    Lost { read_any: bool },
}

/// Run the connection lifecycle for one scanner until it is cancelled or
/// its retry budget is exhausted.
pub(crate) async fn run_connection(
    descriptor: ScannerDescriptor,
    store: FileStore,
    cancel: CancellationToken,
) {
    let mut attempts = 0u32;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        let stream = tokio::select! {
            _ = cancel.cancelled() => return,
            result = dial(&descriptor) => match result {
                Ok(stream) => stream,
                Err(e) => {
                    attempts += 1;
                    if attempts >= MAX_ATTEMPTS {
                        tracing::error!(
                            scanner = %descriptor.name,
                            error = %e,
                            "Giving up after {} failed attempts, marking connection dead",
                            attempts
                        );
                        return;
                    }
                    tracing::warn!(
                        scanner = %descriptor.name,
                        error = %e,
                        "Connect failed, retrying in {:?}",
                        backoff
                    );
                    if !wait_backoff(&cancel, backoff).await {
                        return;
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            }
        };

        tracing::info!(
            scanner = %descriptor.name,
            endpoint = %format!("{}:{}", descriptor.host, descriptor.port),
            "Connected to scanner"
        );

        match read_loop(&descriptor, stream, &store, &cancel).await {
            ReadOutcome::Cancelled => return,
            ReadOutcome::Lost { read_any } => {
                if read_any {
                    // The session made progress; start the budget over.
                    attempts = 0;
                    backoff = INITIAL_BACKOFF;
                } else {
                    attempts += 1;
                    if attempts >= MAX_ATTEMPTS {
                        tracing::error!(
                            scanner = %descriptor.name,
                            "Connection produced no data after {} attempts, marking dead",
                            attempts
                        );
                        return;
                    }
                }
                tracing::warn!(
                    scanner = %descriptor.name,
                    "Connection lost, reconnecting in {:?}",
                    backoff
                );
                if !wait_backoff(&cancel, backoff).await {
                    return;
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

/// Dial the scanner's endpoint.
async fn dial(descriptor: &ScannerDescriptor) -> Result<TcpStream> {
    TcpStream::connect((descriptor.host.as_str(), descriptor.port))
        .await
        .map_err(|e| ScanRelayError::ConnectionFailure {
            scanner: descriptor.name.clone(),
            message: e.to_string(),
        })
}

/// Sleep for `delay` unless cancelled first; false when cancelled.
async fn wait_backoff(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Pump one established connection until it closes or is cancelled.
async fn read_loop(
    descriptor: &ScannerDescriptor,
    mut stream: TcpStream,
    store: &FileStore,
    cancel: &CancellationToken,
) -> ReadOutcome {
    let mut framer = StreamFramer::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut read_any = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                if !framer.pending().is_empty() {
                    tracing::debug!(
                        scanner = %descriptor.name,
                        pending_bytes = framer.pending().len(),
                        "Discarding partial buffer on close"
                    );
                }
                return ReadOutcome::Cancelled;
            }
            result = stream.read(&mut buf) => match result {
                Ok(0) => {
                    tracing::info!(scanner = %descriptor.name, "Scanner closed the connection");
                    return ReadOutcome::Lost { read_any };
                }
                Ok(n) => {
                    read_any = true;
                    if let Some(barcode) = framer.feed(&buf[..n]) {
                        persist_barcode(descriptor, store, barcode);
                    }
                }
                Err(e) => {
                    tracing::warn!(scanner = %descriptor.name, error = %e, "Read failed");
                    return ReadOutcome::Lost { read_any };
                }
            }
        }
    }
}

/// Append one completed barcode. Storage failures are logged rather than
/// tearing down the connection; the stream keeps flowing.
fn persist_barcode(descriptor: &ScannerDescriptor, store: &FileStore, barcode: String) {
    let record = Record::barcode(barcode);
    match store.append(&descriptor.name, &record) {
        Ok(path) => {
            tracing::debug!(
                scanner = %descriptor.name,
                file = %path.display(),
                "Appended record"
            );
        }
        Err(e) => {
            tracing::error!(
                scanner = %descriptor.name,
                error = %e,
                "Failed to persist record"
            );
        }
    }
}
