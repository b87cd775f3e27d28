//! Output location for stamped documents.
//!
//! Files land in `<documents_dir>/<output_subdir>/<file_name>`. Bytes are
//! written to a temporary file in the same directory and renamed into place,
//! so a failed write never leaves a file at the target path.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use crate::config::StampConfig;
use crate::error::{Error, Result};

/// Directory that receives stamped documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation {
    dir: PathBuf,
}

impl OutputLocation {
    /// Output directory for `config`.
    pub fn from_config(config: &StampConfig) -> Self {
        Self::new(config.output_dir())
    }

    /// Use `dir` as the output directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if needed, check `file_name` and clear any
    /// existing file of that name. Returns the target path.
    pub fn prepare(&self, file_name: &str) -> Result<PathBuf> {
        validate_file_name(file_name)?;
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::OutputUnavailable(format!("Could not create directory {}: {}", self.dir.display(), e))
        })?;

        let target = self.dir.join(file_name);
        if target.is_dir() {
            return Err(Error::OutputUnavailable(format!(
                "{} is a directory",
                target.display()
            )));
        }
        if target.exists() {
            fs::remove_file(&target).map_err(|e| {
                Error::OutputUnavailable(format!("Could not remove existing {}: {}", target.display(), e))
            })?;
            log::debug!("Removed existing {}", target.display());
        }
        Ok(target)
    }

    /// Atomically write `bytes` to `target` inside this directory.
    pub fn write(&self, target: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| {
            Error::OutputUnavailable(format!("Could not create temporary file in {}: {}", self.dir.display(), e))
        })?;
        tmp.write_all(bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| Error::ProcessingError(format!("Could not write output: {}", e)))?;
        tmp.persist(target).map_err(|e| {
            Error::OutputUnavailable(format!("Could not move output to {}: {}", target.display(), e.error))
        })?;
        Ok(())
    }
}

/// Reject names that are empty or would leave the output directory.
pub fn validate_file_name(file_name: &str) -> Result<()> {
    let invalid = |reason: &str| Error::OutputUnavailable(format!("Unusable file name {:?}: {}", file_name, reason));
    if file_name.trim().is_empty() {
        return Err(invalid("empty"));
    }
    if file_name.contains('/') || file_name.contains('\\') {
        return Err(invalid("contains a path separator"));
    }
    if file_name.contains('\0') {
        return Err(invalid("contains a NUL byte"));
    }
    let mut components = Path::new(file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid("not a plain file name")),
    }
}
