use thiserror::Error;

pub type SspResult<T> = Result<T, SspError>;

/// Closed error taxonomy for every engine operation.
///
/// Each variant maps to one user-facing failure mode; nothing here
/// wraps a raw cryptographic library error verbatim.
#[derive(Debug, Error)]
pub enum SspError {
    /// The OS entropy source could not be read. Fatal, no fallback.
    #[error("system entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    /// Key-derivation cost parameters fall below the security floor.
    #[error("key derivation parameters below security floor: {0}")]
    WeakParameters(String),

    /// Algorithm identifier not in the supported set.
    #[error("unsupported algorithm identifier: {0:?}")]
    UnsupportedAlgorithm(String),

    /// Structurally invalid input: bad key/nonce size, malformed
    /// payload framing, out-of-range chunk size.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Authentication tag mismatch. Covers tampered ciphertext,
    /// tampered envelope metadata, truncation, and wrong passphrases;
    /// these are indistinguishable by design.
    #[error("integrity check failed: data was altered or the passphrase is wrong")]
    IntegrityViolation,

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Secret exceeds the capacity of the visual encoding.
    #[error("payload too large for visual encoding: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Password policy constraints are mutually exclusive.
    #[error("password policy cannot be satisfied: {0}")]
    UnsatisfiablePolicy(String),

    /// Operation cancelled at a chunk boundary; no output was kept.
    #[error("operation cancelled")]
    Cancelled,
}

impl SspError {
    /// Short stable identifier, used for logging and CLI exit text.
    pub fn kind(&self) -> &'static str {
        match self {
            SspError::EntropyUnavailable(_) => "entropy_unavailable",
            SspError::WeakParameters(_) => "weak_parameters",
            SspError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            SspError::InvalidParameters(_) => "invalid_parameters",
            SspError::IntegrityViolation => "integrity_violation",
            SspError::Io(_) => "io_failure",
            SspError::PayloadTooLarge { .. } => "payload_too_large",
            SspError::UnsatisfiablePolicy(_) => "unsatisfiable_policy",
            SspError::Cancelled => "cancelled",
        }
    }
}
