//! Key derivation: Argon2id passphrase → 256-bit symmetric key

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use ssp_core::{SspError, SspResult};

use crate::{KEY_SIZE, SALT_SIZE};

/// Minimum Argon2id memory cost accepted for new derivations (8 MiB).
pub const MIN_MEM_COST_KIB: u32 = 8192;

/// Minimum Argon2id time cost accepted for new derivations.
pub const MIN_TIME_COST: u32 = 2;

/// Maximum Argon2id memory cost honored by any derivation (4 GiB).
pub const MAX_MEM_COST_KIB: u32 = 4 * 1024 * 1024;

/// Maximum Argon2id time cost honored by any derivation.
pub const MAX_TIME_COST: u32 = 64;

/// A 256-bit symmetric key derived from a passphrase via Argon2id.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id cost parameters. Serialized into the envelope header so
/// decryption never needs external knowledge of how the key was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / passes (default: 3)
    pub time_cost: u32,
    /// Parallelism lanes (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Reject parameters below the documented floor.
    ///
    /// Applied only when deriving keys for *new* envelopes; decryption
    /// honors whatever the stored header declares, so files written
    /// under historical parameters remain readable.
    pub fn check_floor(&self) -> SspResult<()> {
        if self.mem_cost_kib < MIN_MEM_COST_KIB {
            return Err(SspError::WeakParameters(format!(
                "memory cost {} KiB is below the {} KiB floor",
                self.mem_cost_kib, MIN_MEM_COST_KIB
            )));
        }
        if self.time_cost < MIN_TIME_COST {
            return Err(SspError::WeakParameters(format!(
                "time cost {} is below the floor of {}",
                self.time_cost, MIN_TIME_COST
            )));
        }
        Ok(())
    }

    /// Reject parameters above the sanity ceiling.
    ///
    /// Applied on *every* derivation, decryption included: envelope
    /// headers declare their own KDF costs and are read before any
    /// chunk authenticates, so a forged header must not be able to
    /// demand an arbitrarily large allocation.
    pub fn check_ceiling(&self) -> SspResult<()> {
        if self.mem_cost_kib > MAX_MEM_COST_KIB {
            return Err(SspError::InvalidParameters(format!(
                "memory cost {} KiB exceeds the {} KiB ceiling",
                self.mem_cost_kib, MAX_MEM_COST_KIB
            )));
        }
        if self.time_cost > MAX_TIME_COST {
            return Err(SspError::InvalidParameters(format!(
                "time cost {} exceeds the ceiling of {}",
                self.time_cost, MAX_TIME_COST
            )));
        }
        Ok(())
    }
}

/// Derive a 256-bit key from a passphrase and salt using Argon2id.
///
/// Deterministic: the same (passphrase, salt, params) always yields
/// the same key. The salt must be random per derivation and is stored
/// alongside the ciphertext (it is not secret).
pub fn derive_key(
    passphrase: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> SspResult<DerivedKey> {
    params.check_ceiling()?;

    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| SspError::InvalidParameters(format!("Argon2id parameters: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| SspError::InvalidParameters(format!("key derivation: {e}")))?;

    Ok(DerivedKey::from_bytes(key))
}

/// `derive_key` plus the floor check — the entry point for encryption.
pub fn derive_key_checked(
    passphrase: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> SspResult<DerivedKey> {
    params.check_floor()?;
    derive_key(passphrase, salt, params)
}
