//! BIP-39 recovery phrase generation
//!
//! A 24-word phrase backs up a derived key out-of-band: the user
//! writes it down (or exports it through the QR encoder) and the
//! phrase alone recovers the key. The phrase is never stored by this
//! crate.

use bip39::Mnemonic;
use secrecy::SecretString;
use zeroize::Zeroizing;

use ssp_core::{SspError, SspResult};

use crate::entropy::{random_array, EntropySource};
use crate::kdf::{derive_key, DerivedKey, KdfParams};
use crate::SALT_SIZE;

// Domain salt, fixed: the phrase itself carries 256 bits of entropy,
// so per-derivation salting adds nothing here.
const RECOVERY_SALT: [u8; SALT_SIZE] = *b"ssp-recovery-v01";

/// Generate a new 24-word phrase and its derived key.
///
/// The phrase is for one-time display/export; callers must not
/// persist it.
pub fn generate_recovery_phrase(
    entropy: &dyn EntropySource,
) -> SspResult<(Zeroizing<String>, DerivedKey)> {
    // 24 words = 256 bits of entropy
    let raw: [u8; 32] = random_array(entropy)?;

    let mnemonic = Mnemonic::from_entropy(&raw)
        .map_err(|e| SspError::InvalidParameters(format!("recovery phrase generation: {e}")))?;

    let words = Zeroizing::new(mnemonic.to_string());
    let key = recovery_phrase_to_key(&words)?;

    Ok((words, key))
}

/// Recover the key from a 24-word phrase.
///
/// Uses lighter KDF costs than passphrase derivation: the input is
/// already high-entropy, so the work factor defends nothing.
pub fn recovery_phrase_to_key(words: &str) -> SspResult<DerivedKey> {
    let _mnemonic: Mnemonic = words
        .parse()
        .map_err(|e| SspError::InvalidParameters(format!("invalid recovery phrase: {e}")))?;

    let params = KdfParams {
        mem_cost_kib: 16384,
        time_cost: 2,
        parallelism: 1,
    };

    derive_key(
        &SecretString::from(words.to_string()),
        &RECOVERY_SALT,
        &params,
    )
}
