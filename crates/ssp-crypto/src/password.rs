//! Policy-constrained password generation
//!
//! Sampling is uniform over the allowed alphabet via the injected
//! entropy source; when class minimums are unmet the whole candidate
//! is redrawn. No post-hoc shuffling of a fixed composition — that
//! would bias position-dependent character distributions.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use ssp_core::{SspError, SspResult};

use crate::entropy::{uniform_index, EntropySource};

const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGIT: &str = "0123456789";
const SYMBOL: &str = "!@#$%^&*()-_=+[]{};:,.<>?";

/// Resample budget. The up-front satisfiability check makes success
/// overwhelmingly likely within a few draws for any realistic policy;
/// the cap turns a pathological one into a typed error instead of a
/// spin.
const MAX_RESAMPLES: u32 = 4096;

/// Password generation policy.
///
/// A class participates in the alphabet when its `use_*` flag is set;
/// `min_*` counts demand at least that many characters of the class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    pub length: usize,
    pub use_lower: bool,
    pub use_upper: bool,
    pub use_digit: bool,
    pub use_symbol: bool,
    pub min_lower: usize,
    pub min_upper: usize,
    pub min_digit: usize,
    pub min_symbol: usize,
    /// Characters excluded from the alphabet (e.g. ambiguous "l1O0").
    pub exclude: String,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: 16,
            use_lower: true,
            use_upper: true,
            use_digit: true,
            use_symbol: true,
            min_lower: 1,
            min_upper: 1,
            min_digit: 1,
            min_symbol: 1,
            exclude: String::new(),
        }
    }
}

/// A freshly generated secret. The plaintext value is transient and
/// zeroized when dropped; it is never persisted by this crate.
pub struct GeneratedSecret {
    pub value: Zeroizing<String>,
    /// Shannon entropy of the draw in bits: length × log2(alphabet).
    pub entropy_bits: f64,
    pub policy: PasswordPolicy,
}

impl std::fmt::Debug for GeneratedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedSecret")
            .field("value", &"[REDACTED]")
            .field("entropy_bits", &self.entropy_bits)
            .field("policy", &self.policy)
            .finish()
    }
}

struct Classes {
    lower: Vec<char>,
    upper: Vec<char>,
    digit: Vec<char>,
    symbol: Vec<char>,
}

fn filtered(class: &str, exclude: &str) -> Vec<char> {
    class.chars().filter(|c| !exclude.contains(*c)).collect()
}

fn check_policy(policy: &PasswordPolicy) -> SspResult<Classes> {
    if policy.length == 0 {
        return Err(SspError::UnsatisfiablePolicy(
            "requested length is zero".into(),
        ));
    }

    let classes = Classes {
        lower: if policy.use_lower {
            filtered(LOWER, &policy.exclude)
        } else {
            Vec::new()
        },
        upper: if policy.use_upper {
            filtered(UPPER, &policy.exclude)
        } else {
            Vec::new()
        },
        digit: if policy.use_digit {
            filtered(DIGIT, &policy.exclude)
        } else {
            Vec::new()
        },
        symbol: if policy.use_symbol {
            filtered(SYMBOL, &policy.exclude)
        } else {
            Vec::new()
        },
    };

    let demands = [
        (policy.min_lower, &classes.lower, "lowercase"),
        (policy.min_upper, &classes.upper, "uppercase"),
        (policy.min_digit, &classes.digit, "digit"),
        (policy.min_symbol, &classes.symbol, "symbol"),
    ];
    for (min, chars, name) in &demands {
        if *min > 0 && chars.is_empty() {
            return Err(SspError::UnsatisfiablePolicy(format!(
                "{name} characters required but none are available"
            )));
        }
    }

    let total_min: usize = demands.iter().map(|(min, _, _)| *min).sum();
    if total_min > policy.length {
        return Err(SspError::UnsatisfiablePolicy(format!(
            "class minimums sum to {total_min} but length is {}",
            policy.length
        )));
    }

    let alphabet_len =
        classes.lower.len() + classes.upper.len() + classes.digit.len() + classes.symbol.len();
    if alphabet_len == 0 {
        return Err(SspError::UnsatisfiablePolicy(
            "alphabet is empty after exclusions".into(),
        ));
    }

    Ok(classes)
}

fn satisfies(candidate: &str, policy: &PasswordPolicy, classes: &Classes) -> bool {
    let mut lower = 0;
    let mut upper = 0;
    let mut digit = 0;
    let mut symbol = 0;
    for c in candidate.chars() {
        if classes.lower.contains(&c) {
            lower += 1;
        } else if classes.upper.contains(&c) {
            upper += 1;
        } else if classes.digit.contains(&c) {
            digit += 1;
        } else if classes.symbol.contains(&c) {
            symbol += 1;
        }
    }
    lower >= policy.min_lower
        && upper >= policy.min_upper
        && digit >= policy.min_digit
        && symbol >= policy.min_symbol
}

/// Generate a password meeting `policy`, drawing every character
/// uniformly from the allowed alphabet.
pub fn generate_password(
    entropy: &dyn EntropySource,
    policy: &PasswordPolicy,
) -> SspResult<GeneratedSecret> {
    let classes = check_policy(policy)?;

    let mut alphabet: Vec<char> = Vec::new();
    alphabet.extend(&classes.lower);
    alphabet.extend(&classes.upper);
    alphabet.extend(&classes.digit);
    alphabet.extend(&classes.symbol);

    for _ in 0..MAX_RESAMPLES {
        let mut candidate = Zeroizing::new(String::with_capacity(policy.length));
        for _ in 0..policy.length {
            let idx = uniform_index(entropy, alphabet.len())?;
            candidate.push(alphabet[idx]);
        }

        if satisfies(&candidate, policy, &classes) {
            let entropy_bits = policy.length as f64 * (alphabet.len() as f64).log2();
            return Ok(GeneratedSecret {
                value: candidate,
                entropy_bits,
                policy: policy.clone(),
            });
        }
    }

    Err(SspError::UnsatisfiablePolicy(format!(
        "class minimums not met within {MAX_RESAMPLES} uniform draws"
    )))
}
