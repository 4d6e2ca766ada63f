//! Stream framer
//!
//! Per-connection state machine that accumulates inbound bytes and decides
//! when a complete barcode unit has arrived. The completion rule is a
//! pluggable policy; the default treats any buffer of 10 or more characters
//! as one complete barcode. Swapping in terminator detection or checksum
//! validation only requires a new `CompletionPolicy` implementation.

/// Decides when an accumulation buffer holds one complete barcode.
pub trait CompletionPolicy: Send + Sync {
    fn is_complete(&self, buffer: &str) -> bool;
}

/// Default completion policy: a buffer of at least `min_len` characters is
/// one complete barcode.
#[derive(Debug, Clone)]
pub struct MinLengthPolicy {
    min_len: usize,
}

impl MinLengthPolicy {
    pub const DEFAULT_MIN_LEN: usize = 10;

    pub fn new(min_len: usize) -> Self {
        Self { min_len }
    }
}

impl Default for MinLengthPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_LEN)
    }
}

impl CompletionPolicy for MinLengthPolicy {
    fn is_complete(&self, buffer: &str) -> bool {
        buffer.chars().count() >= self.min_len
    }
}

/// Accumulates socket bytes into completed barcode strings.
///
/// Each fed chunk is interpreted as UTF-8 (lossily) and trimmed of leading
/// and trailing whitespace before being appended. Once the policy reports
/// completion the whole buffer is emitted and accumulation restarts empty.
pub struct StreamFramer {
    buffer: String,
    policy: Box<dyn CompletionPolicy>,
    max_buffer_bytes: usize,
}

/// Upper bound on buffered bytes when a completion condition never arrives.
/// An overflowing buffer is flushed as a barcode rather than growing
/// without limit.
const MAX_BUFFER_BYTES: usize = 64 * 1024;

impl StreamFramer {
    pub fn new() -> Self {
        Self::with_policy(Box::new(MinLengthPolicy::default()))
    }

    pub fn with_policy(policy: Box<dyn CompletionPolicy>) -> Self {
        Self {
            buffer: String::new(),
            policy,
            max_buffer_bytes: MAX_BUFFER_BYTES,
        }
    }

    /// Feed one chunk of raw socket bytes.
    ///
    /// Returns the completed barcode when this chunk satisfies the
    /// completion policy, `None` while accumulation continues.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(chunk);
        self.buffer.push_str(text.trim());

        if self.policy.is_complete(&self.buffer) {
            return Some(std::mem::take(&mut self.buffer));
        }

        if self.buffer.len() > self.max_buffer_bytes {
            tracing::warn!(
                buffered_bytes = self.buffer.len(),
                "Accumulation buffer exceeded {} bytes without completing, flushing",
                self.max_buffer_bytes
            );
            return Some(std::mem::take(&mut self.buffer));
        }

        None
    }

    /// The partial accumulation not yet emitted.
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

impl Default for StreamFramer {
    fn default() -> Self {
        Self::new()
    }
}
