//! ssp-engine: shell-facing facade over the Secure Suite primitives
//!
//! Every operation is one transaction: it fully succeeds (output
//! committed, `Phase::Done` emitted) or fully fails with a typed
//! error and no partial output. File outputs go through a temp file
//! in the destination directory and are renamed into place only after
//! the final chunk verifies.
//!
//! The facade itself is synchronous; [`worker::spawn`] runs an
//! operation on a dedicated thread with an mpsc progress channel so
//! an interactive caller never blocks on a multi-second derivation or
//! a large file.

pub mod commit;
pub mod engine;
pub mod worker;

pub use engine::{CryptoEngine, DecryptReport, EncryptReport};
pub use worker::{spawn, TaskHandle};
