//! Commit-on-success output files
//!
//! Output is written to a named temp file in the destination's
//! directory (same filesystem, so the final rename is atomic) and
//! only renamed into place once the operation fully verifies.
//! Dropping an uncommitted [`PendingFile`] deletes the temp file, so
//! every early return — error or cancellation — cleans up by itself
//! and never clobbers an existing file at the destination.

use std::fs::File;
use std::path::Path;

use tempfile::NamedTempFile;

use ssp_core::{SspError, SspResult};

pub struct PendingFile {
    tmp: NamedTempFile,
}

impl PendingFile {
    pub fn create(dest: &Path) -> SspResult<Self> {
        let dir = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let tmp = tempfile::Builder::new()
            .prefix(".ssp-partial-")
            .tempfile_in(dir)?;
        Ok(Self { tmp })
    }

    pub fn file_mut(&mut self) -> &mut File {
        self.tmp.as_file_mut()
    }

    /// Rename the finished temp file onto `dest`, replacing any
    /// previous file there in one step.
    pub fn commit(self, dest: &Path) -> SspResult<()> {
        self.tmp.persist(dest).map_err(|e| SspError::Io(e.error))?;
        Ok(())
    }
}
