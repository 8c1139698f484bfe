//! The CryptoEngine facade

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::SecretString;
use tracing::{debug, info};
use zeroize::Zeroizing;

use ssp_core::progress::{emit, Phase, ProgressEvent};
use ssp_core::{CancelToken, ProgressFn, SspError, SspResult, SuiteConfig};
use ssp_crypto::entropy::{random_array, EntropySource, OsEntropy};
use ssp_crypto::envelope::{
    open_bytes, peek_header, seal_bytes, EnvelopeHeader, EnvelopeReader, EnvelopeWriter,
};
use ssp_crypto::hash::{hash_reader, DigestResult, HashAlgorithm};
use ssp_crypto::kdf::{derive_key, derive_key_checked, DerivedKey, KdfParams};
use ssp_crypto::password::{generate_password, GeneratedSecret, PasswordPolicy};
use ssp_crypto::qr::{decode_secret, encode_secret, VisualCode};
use ssp_crypto::recovery;
use ssp_crypto::SALT_SIZE;

use crate::commit::PendingFile;

/// Outcome of a committed file encryption.
#[derive(Debug, Clone)]
pub struct EncryptReport {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub plaintext_bytes: u64,
    pub chunks: u64,
}

/// Outcome of a committed file decryption.
#[derive(Debug, Clone)]
pub struct DecryptReport {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub plaintext_bytes: u64,
    pub chunks: u64,
    /// Original file name recorded in the envelope, if any.
    pub original_name: Option<String>,
}

/// Facade over the crypto primitives, holding the configuration and
/// the injected entropy source. Cheap to clone-by-construction; all
/// operations take `&self` and share no mutable state, so independent
/// calls may run concurrently.
pub struct CryptoEngine {
    config: SuiteConfig,
    entropy: Arc<dyn EntropySource>,
}

impl CryptoEngine {
    pub fn new(config: SuiteConfig, entropy: Arc<dyn EntropySource>) -> Self {
        Self { config, entropy }
    }

    /// Production setup: default config, OS entropy.
    pub fn with_defaults() -> Self {
        Self::new(SuiteConfig::default(), Arc::new(OsEntropy))
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    fn kdf_params(&self) -> KdfParams {
        KdfParams {
            mem_cost_kib: self.config.kdf.mem_cost_kib,
            time_cost: self.config.kdf.time_cost,
            parallelism: self.config.kdf.parallelism,
        }
    }

    // ── File encryption ────────────────────────────────────────────────────

    /// Encrypt `src` into a self-describing envelope at `dst`.
    ///
    /// Streams in configured-size chunks, checks `cancel` between
    /// chunks, and commits the output only after the final chunk is
    /// sealed. On any failure nothing appears at `dst`.
    pub fn encrypt_file(
        &self,
        src: &Path,
        dst: &Path,
        passphrase: &SecretString,
        progress: Option<&ProgressFn>,
        cancel: Option<&CancelToken>,
    ) -> SspResult<EncryptReport> {
        const OP: &str = "encrypt_file";
        debug!(src = %src.display(), dst = %dst.display(), "encrypting file");

        let file = File::open(src)?;
        let total = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let params = self.kdf_params();
        let salt: [u8; SALT_SIZE] = random_array(self.entropy.as_ref())?;

        emit(
            progress,
            ProgressEvent {
                operation: OP,
                phase: Phase::Derive,
                bytes_done: 0,
                bytes_total: Some(total),
            },
        );
        let key = derive_key_checked(passphrase, &salt, &params)?;

        let original_name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        let header = EnvelopeHeader::new(
            params,
            &salt,
            self.config.engine.chunk_size,
            original_name,
        );

        let mut pending = PendingFile::create(dst)?;
        let chunks = {
            let out = BufWriter::new(pending.file_mut());
            let mut writer = EnvelopeWriter::new(out, &key, self.entropy.as_ref(), &header)?;

            let chunk_size = self.config.engine.chunk_size as usize;
            let mut current = Zeroizing::new(vec![0u8; chunk_size]);
            let mut next = Zeroizing::new(vec![0u8; chunk_size]);
            let mut current_len = read_full(&mut reader, &mut current)?;
            let mut done: u64 = 0;

            loop {
                check_cancel(cancel)?;

                // One chunk of lookahead decides the last-chunk flag.
                let next_len = if current_len < chunk_size {
                    0
                } else {
                    read_full(&mut reader, &mut next)?
                };
                let last = next_len == 0;

                writer.write_chunk(&current[..current_len], last)?;
                done += current_len as u64;
                emit(
                    progress,
                    ProgressEvent {
                        operation: OP,
                        phase: Phase::Process,
                        bytes_done: done,
                        bytes_total: Some(total),
                    },
                );

                if last {
                    break;
                }
                std::mem::swap(&mut current, &mut next);
                current_len = next_len;
            }

            let (mut out, chunks) = writer.finish()?;
            out.flush()?;
            chunks
        };

        emit(
            progress,
            ProgressEvent {
                operation: OP,
                phase: Phase::Commit,
                bytes_done: total,
                bytes_total: Some(total),
            },
        );
        pending.commit(dst)?;
        emit(
            progress,
            ProgressEvent {
                operation: OP,
                phase: Phase::Done,
                bytes_done: total,
                bytes_total: Some(total),
            },
        );

        info!(dst = %dst.display(), bytes = total, chunks, "file encrypted");
        Ok(EncryptReport {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            plaintext_bytes: total,
            chunks,
        })
    }

    /// Decrypt an envelope at `src` into `dst`.
    ///
    /// The tag of every chunk is verified before its plaintext leaves
    /// the temp file stage; a failure at any point discards all
    /// partial output and leaves any existing file at `dst` intact.
    pub fn decrypt_file(
        &self,
        src: &Path,
        dst: &Path,
        passphrase: &SecretString,
        progress: Option<&ProgressFn>,
        cancel: Option<&CancelToken>,
    ) -> SspResult<DecryptReport> {
        const OP: &str = "decrypt_file";
        debug!(src = %src.display(), dst = %dst.display(), "decrypting file");

        let file = File::open(src)?;
        let mut reader = EnvelopeReader::new(BufReader::new(file))?;
        let header = reader.header().clone();
        let salt = header.salt_bytes()?;

        emit(
            progress,
            ProgressEvent {
                operation: OP,
                phase: Phase::Derive,
                bytes_done: 0,
                bytes_total: None,
            },
        );
        // Derivation follows the stored header so old envelopes stay
        // readable; the floor applies only to new encryptions.
        let key = derive_key(passphrase, &salt, &header.kdf)?;

        let mut pending = PendingFile::create(dst)?;
        let (bytes, chunks) = {
            let mut out = BufWriter::new(pending.file_mut());
            let mut bytes: u64 = 0;

            loop {
                check_cancel(cancel)?;
                match reader.next_chunk(&key)? {
                    Some(chunk) => {
                        let chunk = Zeroizing::new(chunk);
                        out.write_all(&chunk)?;
                        bytes += chunk.len() as u64;
                        emit(
                            progress,
                            ProgressEvent {
                                operation: OP,
                                phase: Phase::Process,
                                bytes_done: bytes,
                                bytes_total: None,
                            },
                        );
                    }
                    None => break,
                }
            }

            out.flush()?;
            (bytes, reader.chunks_read())
        };

        emit(
            progress,
            ProgressEvent {
                operation: OP,
                phase: Phase::Commit,
                bytes_done: bytes,
                bytes_total: Some(bytes),
            },
        );
        pending.commit(dst)?;
        emit(
            progress,
            ProgressEvent {
                operation: OP,
                phase: Phase::Done,
                bytes_done: bytes,
                bytes_total: Some(bytes),
            },
        );

        info!(dst = %dst.display(), bytes, chunks, "file decrypted");
        Ok(DecryptReport {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            plaintext_bytes: bytes,
            chunks,
            original_name: header.filename,
        })
    }

    // ── Text encryption ────────────────────────────────────────────────────

    /// Encrypt a text/buffer into a base64-armored envelope string.
    pub fn encrypt_text(&self, plaintext: &[u8], passphrase: &SecretString) -> SspResult<String> {
        let params = self.kdf_params();
        let salt: [u8; SALT_SIZE] = random_array(self.entropy.as_ref())?;
        let key = derive_key_checked(passphrase, &salt, &params)?;

        let header = EnvelopeHeader::new(params, &salt, self.config.engine.chunk_size, None);
        let envelope = seal_bytes(self.entropy.as_ref(), &key, &header, plaintext)?;
        Ok(b64_encode(&envelope))
    }

    /// Decrypt a base64-armored envelope string.
    pub fn decrypt_text(
        &self,
        armored: &str,
        passphrase: &SecretString,
    ) -> SspResult<Zeroizing<Vec<u8>>> {
        let envelope = b64_decode(armored.trim())?;
        let header = peek_header(&envelope)?;
        let salt = header.salt_bytes()?;
        let key = derive_key(passphrase, &salt, &header.kdf)?;
        Ok(Zeroizing::new(open_bytes(&key, &envelope)?))
    }

    // ── Hashing ────────────────────────────────────────────────────────────

    /// Digest a file under `algorithm`, streaming in configured-size
    /// chunks with progress and cancellation at chunk boundaries.
    pub fn hash_file(
        &self,
        algorithm: HashAlgorithm,
        path: &Path,
        progress: Option<&ProgressFn>,
        cancel: Option<&CancelToken>,
    ) -> SspResult<DigestResult> {
        const OP: &str = "hash_file";
        let file = File::open(path)?;
        let total = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let result = hash_reader(
            algorithm,
            &mut reader,
            self.config.engine.chunk_size as usize,
            Some(total),
            progress,
            cancel,
        )?;
        emit(
            progress,
            ProgressEvent {
                operation: OP,
                phase: Phase::Done,
                bytes_done: result.bytes_processed,
                bytes_total: Some(total),
            },
        );
        debug!(
            path = %path.display(),
            algorithm = %algorithm,
            bytes = result.bytes_processed,
            "file hashed"
        );
        Ok(result)
    }

    // ── Secret generation and transfer ─────────────────────────────────────

    pub fn generate_password(&self, policy: &PasswordPolicy) -> SspResult<GeneratedSecret> {
        generate_password(self.entropy.as_ref(), policy)
    }

    /// Generate a 24-word recovery phrase and its derived key.
    pub fn generate_recovery_phrase(
        &self,
    ) -> SspResult<(Zeroizing<String>, DerivedKey)> {
        recovery::generate_recovery_phrase(self.entropy.as_ref())
    }

    /// Recover a key from a previously issued recovery phrase.
    pub fn recover_key(&self, phrase: &str) -> SspResult<DerivedKey> {
        recovery::recovery_phrase_to_key(phrase)
    }

    /// Export a secret as a scannable QR code.
    pub fn export_secret(&self, secret: &[u8]) -> SspResult<VisualCode> {
        encode_secret(secret)
    }

    /// Import a secret from a scanned QR payload.
    pub fn import_secret(&self, payload: &str) -> SspResult<Zeroizing<Vec<u8>>> {
        decode_secret(payload)
    }
}

fn check_cancel(cancel: Option<&CancelToken>) -> SspResult<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(SspError::Cancelled),
        _ => Ok(()),
    }
}

/// Read until `buf` is full or the stream ends; returns bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> SspResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn b64_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(data)
}

fn b64_decode(data: &str) -> SspResult<Vec<u8>> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD
        .decode(data)
        .map_err(|_| SspError::InvalidParameters("armored envelope is not valid base64".into()))
}
