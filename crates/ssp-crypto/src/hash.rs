//! Streaming digests over a closed set of algorithms
//!
//! Memory use is independent of input size: the reader path consumes
//! bounded chunks and reports progress at every chunk boundary. MD5 is
//! retained only for legacy file-identification compatibility and is
//! flagged insecure in every result that uses it.

use std::io::Read;
use std::str::FromStr;

use md5::Md5;
use sha2::{Digest, Sha256, Sha512};

use ssp_core::progress::{emit, Phase, ProgressEvent};
use ssp_core::{CancelToken, ProgressFn, SspError, SspResult};

/// The supported digest algorithms. Closed set: unknown identifiers
/// are rejected at parse time, never dispatched dynamically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
    /// Legacy, cryptographically broken. Kept only so old file
    /// inventories keyed by MD5 stay identifiable.
    Md5,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Md5 => "md5",
        }
    }

    pub fn digest_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
            HashAlgorithm::Md5 => 16,
        }
    }

    /// True for algorithms that must not be trusted for integrity.
    pub fn is_insecure(&self) -> bool {
        matches!(self, HashAlgorithm::Md5)
    }
}

impl FromStr for HashAlgorithm {
    type Err = SspError;

    fn from_str(s: &str) -> SspResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha512" | "sha-512" => Ok(HashAlgorithm::Sha512),
            "md5" => Ok(HashAlgorithm::Md5),
            other => Err(SspError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a completed digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestResult {
    pub algorithm: HashAlgorithm,
    pub digest: Vec<u8>,
    pub bytes_processed: u64,
    /// Mirrors `algorithm.is_insecure()` so callers holding only the
    /// result still see the warning.
    pub insecure: bool,
}

impl DigestResult {
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(self.digest.len() * 2);
        for byte in &self.digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

enum Inner {
    Sha256(Sha256),
    Sha512(Sha512),
    Md5(Md5),
}

/// Incremental hasher; feed it chunks in input order and finalize.
pub struct StreamingHasher {
    algorithm: HashAlgorithm,
    inner: Inner,
    bytes: u64,
}

impl StreamingHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let inner = match algorithm {
            HashAlgorithm::Sha256 => Inner::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => Inner::Sha512(Sha512::new()),
            HashAlgorithm::Md5 => Inner::Md5(Md5::new()),
        };
        Self {
            algorithm,
            inner,
            bytes: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.inner {
            Inner::Sha256(h) => h.update(data),
            Inner::Sha512(h) => h.update(data),
            Inner::Md5(h) => h.update(data),
        }
        self.bytes += data.len() as u64;
    }

    pub fn finalize(self) -> DigestResult {
        let digest = match self.inner {
            Inner::Sha256(h) => h.finalize().to_vec(),
            Inner::Sha512(h) => h.finalize().to_vec(),
            Inner::Md5(h) => h.finalize().to_vec(),
        };
        DigestResult {
            algorithm: self.algorithm,
            digest,
            bytes_processed: self.bytes,
            insecure: self.algorithm.is_insecure(),
        }
    }
}

/// Hash an in-memory buffer. Fast path for small inputs.
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> DigestResult {
    let mut hasher = StreamingHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Hash a byte stream in bounded chunks.
///
/// Reads sequentially until EOF; emits a progress event per chunk and
/// checks the cancel token at the same boundary. Read errors propagate
/// as `Io`, never retried.
pub fn hash_reader<R: Read>(
    algorithm: HashAlgorithm,
    reader: &mut R,
    chunk_size: usize,
    bytes_total: Option<u64>,
    progress: Option<&ProgressFn>,
    cancel: Option<&CancelToken>,
) -> SspResult<DigestResult> {
    if chunk_size == 0 {
        return Err(SspError::InvalidParameters(
            "hash chunk size must be non-zero".into(),
        ));
    }

    let mut hasher = StreamingHasher::new(algorithm);
    let mut buf = vec![0u8; chunk_size];

    loop {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(SspError::Cancelled);
            }
        }

        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);

        emit(
            progress,
            ProgressEvent {
                operation: "hash_file",
                phase: Phase::Process,
                bytes_done: hasher.bytes,
                bytes_total,
            },
        );
    }

    Ok(hasher.finalize())
}
