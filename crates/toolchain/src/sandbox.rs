// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job working directories.

use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use mill_core::JobId;
use tracing::warn;

use crate::error::ToolchainError;

/// A job's working directory: `{processing_root}/job_{id}_{epoch}/` with the
/// source copied in. All job commands run with this as their cwd.
#[derive(Debug)]
pub struct Sandbox {
    dir: PathBuf,
    source_name: String,
}

impl Sandbox {
    /// Create the directory (0755) and copy the source into it.
    pub fn create(
        processing_root: &Path,
        job_id: JobId,
        epoch_secs: u64,
        source_path: &Path,
    ) -> Result<Self, ToolchainError> {
        let dir = processing_root.join(format!("job_{}_{}", job_id, epoch_secs));
        std::fs::DirBuilder::new()
            .mode(0o755)
            .create(&dir)
            .map_err(|source| ToolchainError::Sandbox { path: dir.clone(), source })?;

        let source_name = source_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ToolchainError::BadSourceName(source_path.display().to_string())
            })?
            .to_string();

        // Strip the manager's `job_{id}_` storage prefix so commands see the
        // filename the client uploaded.
        let source_name = source_name
            .strip_prefix(&format!("job_{}_", job_id))
            .unwrap_or(&source_name)
            .to_string();

        let dest = dir.join(&source_name);
        if let Err(source) = std::fs::copy(source_path, &dest) {
            let _ = std::fs::remove_dir_all(&dir);
            return Err(ToolchainError::Sandbox { path: dest, source });
        }

        Ok(Self { dir, source_name })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Basename of the source inside the sandbox.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Remove the directory and everything in it.
    pub fn remove(self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %self.dir.display(), error = %e, "failed to remove sandbox");
            }
        }
    }
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
