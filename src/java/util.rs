use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use glob::glob;
use itertools::Itertools;
use which::which;

use crate::error::{InternalCategory, JudgeError};

/// Finds and returns the path to the javac binary.
pub fn javac_path() -> Result<OsString, JudgeError> {
    which("javac").map(PathBuf::into_os_string).map_err(|e| {
        JudgeError::internal(
            InternalCategory::ToolchainUnavailable,
            format!("Cannot find a Java Compiler on path (javac): {e}"),
        )
    })
}

/// Finds and returns the path to the java binary.
pub fn java_path() -> Result<OsString, JudgeError> {
    which("java").map(PathBuf::into_os_string).map_err(|e| {
        JudgeError::internal(
            InternalCategory::ToolchainUnavailable,
            format!("Cannot find a Java runtime on path (java): {e}"),
        )
    })
}

/// Platform classpath separator.
pub fn separator() -> &'static str {
    if cfg!(windows) { ";" } else { ":" }
}

/// Joins classpath entries with the platform separator.
pub fn classpath<P: AsRef<Path>>(entries: &[P]) -> String {
    entries
        .iter()
        .map(|p| p.as_ref().display())
        .join(separator())
}

/// Anchors a relative path at the current directory. Subprocesses run with
/// their own working directory, so every path handed to them must be absolute.
pub fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// A glob utility function to find every file with the given extension
/// below `root_dir`, at any depth.
pub fn find_files(extension: &str, root_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = root_dir.join("**").join(format!("*.{extension}"));
    let pattern = pattern
        .to_str()
        .context("Could not convert root_dir to string")?
        .to_string();

    Ok(glob(&pattern)
        .context("Could not create glob")?
        .filter_map(Result::ok)
        .collect())
}

/// A uniquely named directory under a scratch root, removed on drop.
#[derive(Debug)]
pub struct ScratchDir {
    /// absolute path of the directory
    path: PathBuf,
}

impl ScratchDir {
    /// Creates `<root>/<label>-<uuid>`.
    pub fn create(root: &Path, label: &str) -> Result<Self, JudgeError> {
        let path = root.join(format!("{label}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path).map_err(|e| {
            JudgeError::internal(
                InternalCategory::Io,
                format!("cannot create scratch directory {}: {e}", path.display()),
            )
        })?;
        Ok(Self { path })
    }

    /// Path of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            tracing::debug!(path = %self.path.display(), "failed to remove scratch dir: {e}");
        }
    }
}
