//! Progress reporting and cooperative cancellation.
//!
//! Long-running operations emit a [`ProgressEvent`] at each chunk
//! boundary and check a shared [`CancelToken`] at the same points. The
//! token is the only place a caller can interrupt an operation; there
//! is no preemption mid-chunk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Phase of a long-running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Passphrase-to-key derivation (single event, duration dominated
    /// by the KDF work factor).
    Derive,
    /// Chunk-by-chunk encryption/decryption/hashing.
    Process,
    /// Output verified, renaming temp file into place.
    Commit,
    /// Operation fully complete; output committed.
    Done,
}

/// Progress callback payload (operation id, bytes done, total, phase)
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Stable operation name ("encrypt_file", "hash_file", ...)
    pub operation: &'static str,
    pub phase: Phase,
    pub bytes_done: u64,
    /// None when the input length is unknown (non-seekable streams)
    pub bytes_total: Option<u64>,
}

/// Progress callback type, mirrored by every streaming operation.
pub type ProgressFn = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Cheaply clonable cancellation flag, checked between chunks.
///
/// Raising it mid-operation makes the operation fail with
/// `SspError::Cancelled` at the next chunk boundary and discard all
/// in-flight output.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Emit an event through an optional callback.
pub fn emit(progress: Option<&ProgressFn>, event: ProgressEvent) {
    if let Some(cb) = progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn emit_is_noop_without_callback() {
        emit(
            None,
            ProgressEvent {
                operation: "test",
                phase: Phase::Process,
                bytes_done: 0,
                bytes_total: None,
            },
        );
    }
}
