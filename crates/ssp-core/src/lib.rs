//! ssp-core: shared foundation for the Secure Suite engine
//!
//! - `error`: the closed `SspError` taxonomy every crate returns
//! - `config`: TOML configuration (`ssp.toml`) with serde defaults
//! - `progress`: progress events, callback alias, cancellation token

pub mod config;
pub mod error;
pub mod progress;

pub use config::SuiteConfig;
pub use error::{SspError, SspResult};
pub use progress::{CancelToken, Phase, ProgressEvent, ProgressFn};
