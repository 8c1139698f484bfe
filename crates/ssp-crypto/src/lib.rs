//! ssp-crypto: cryptographic primitives for the Secure Suite engine
//!
//! Envelope pipeline: passphrase → Argon2id → 256-bit key →
//! per-chunk XChaCha20-Poly1305 with header-bound AAD.
//!
//! ```text
//! Envelope layout:
//!   "SSP1" | header_len u32 BE | header JSON | chunk*
//!   chunk: [framed_len u32 BE][24-byte nonce][ciphertext + 16-byte tag]
//!   AAD  : SHA-256(header JSON) || chunk_index (8 bytes BE) || last flag
//! ```
//!
//! All randomness flows through an injected [`EntropySource`]; there
//! is no process-wide RNG state anywhere in this crate.

pub mod entropy;
pub mod envelope;
pub mod hash;
pub mod kdf;
pub mod password;
pub mod qr;
pub mod recovery;

pub use entropy::{EntropySource, OsEntropy, SeededEntropy};
pub use envelope::{EnvelopeHeader, EnvelopeReader, EnvelopeWriter, CIPHER_ID};
pub use hash::{DigestResult, HashAlgorithm, StreamingHasher};
pub use kdf::{derive_key, DerivedKey, KdfParams};
pub use password::{generate_password, GeneratedSecret, PasswordPolicy};
pub use qr::{decode_secret, encode_secret, VisualCode};
pub use recovery::{generate_recovery_phrase, recovery_phrase_to_key};

/// Size of a derived symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of a key-derivation salt
pub const SALT_SIZE: usize = 16;
