use serde::{Deserialize, Serialize};

/// Top-level configuration (loaded from ssp.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    pub kdf: KdfConfig,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

/// Argon2id cost knobs.
///
/// The floors (8 MiB memory, 2 passes) are enforced at derivation
/// time, not at parse time, so envelopes written under historical
/// parameters still decrypt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / passes (default: 3)
    pub time_cost: u32,
    /// Parallelism lanes (default: 4)
    pub parallelism: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Streaming chunk size in bytes for file encryption and hashing
    /// (default: 1 MiB). Validated against [4 KiB, 16 MiB] when used.
    pub chunk_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
