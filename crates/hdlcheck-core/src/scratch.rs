//! Scratch source files handed to the toolchain.
//!
//! A [`ScratchFile`] lives exactly as long as the value: it is deleted when
//! dropped, whichever way the owning scope exits (return, `?`, timeout or
//! task cancellation). Names combine a UUID v4 with tempfile's own random
//! suffix so concurrent requests never share a path.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use uuid::Uuid;

use crate::domain::CheckResult;
use crate::obs;

/// A uniquely named, self-deleting source file.
#[derive(Debug)]
pub struct ScratchFile {
    file: Option<NamedTempFile>,
    path: PathBuf,
}

impl ScratchFile {
    /// Write `contents` (newline-terminated) to a fresh file under `dir`.
    pub fn create(dir: &Path, suffix: &str, contents: &str) -> CheckResult<Self> {
        let prefix = format!("hdlcheck-{}-", Uuid::new_v4().simple());
        let mut file = Builder::new()
            .prefix(&prefix)
            .suffix(suffix)
            .tempfile_in(dir)?;

        file.write_all(contents.as_bytes())?;
        if !contents.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        file.flush()?;

        let path = file.path().to_path_buf();
        Ok(Self {
            file: Some(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            match file.close() {
                Ok(()) => obs::emit_scratch_removed(&self.path),
                Err(e) => obs::emit_scratch_cleanup_error(&self.path, &e),
            }
        }
    }
}
