// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracked file index over the processing and outgoing roots.
//!
//! The manager owns every path it hands out. All writes go through
//! [`FileManager::save_uploaded`] / [`FileManager::save_artefact`] so the
//! containment invariant (every tracked path canonicalises under a managed
//! root) is checked at creation and again on every open. The index mutex is
//! never held across file I/O.

use std::collections::HashMap;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use mill_core::{Clock, JobId, SessionId, Tunables};
use tracing::{debug, warn};

use crate::error::FileError;
use crate::names::validate_filename;

/// Snapshot of one tracked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub job_id: JobId,
    pub session_id: SessionId,
    pub basename: String,
    pub full_path: PathBuf,
    pub size: u64,
    pub created_at_ms: u64,
    pub last_accessed_ms: u64,
    pub is_temporary: bool,
}

pub struct FileManager<C: Clock> {
    processing_root: PathBuf,
    outgoing_root: PathBuf,
    tunables: Arc<Mutex<Tunables>>,
    clock: C,
    index: Mutex<HashMap<String, FileInfo>>,
    temp_seq: AtomicU64,
}

impl<C: Clock> FileManager<C> {
    /// Create both roots and canonicalise them for containment checks.
    pub fn new(
        processing_root: impl Into<PathBuf>,
        outgoing_root: impl Into<PathBuf>,
        tunables: Arc<Mutex<Tunables>>,
        clock: C,
    ) -> Result<Self, FileError> {
        let processing_root = create_root(processing_root.into())?;
        let outgoing_root = create_root(outgoing_root.into())?;
        Ok(Self {
            processing_root,
            outgoing_root,
            tunables,
            clock,
            index: Mutex::new(HashMap::new()),
            temp_seq: AtomicU64::new(0),
        })
    }

    pub fn processing_root(&self) -> &Path {
        &self.processing_root
    }

    pub fn outgoing_root(&self) -> &Path {
        &self.outgoing_root
    }

    /// Write an uploaded source as `job_{id}_{filename}` under the
    /// processing root. Exclusive-create; a partial file is removed on
    /// write failure.
    pub fn save_uploaded(
        &self,
        job_id: JobId,
        session_id: SessionId,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, FileError> {
        self.save_into(
            &self.processing_root,
            job_id,
            session_id,
            filename,
            &format!("job_{}_{}", job_id, filename),
            bytes,
        )
    }

    /// Write a result artefact under the outgoing root.
    pub fn save_artefact(
        &self,
        job_id: JobId,
        session_id: SessionId,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, FileError> {
        self.save_into(
            &self.outgoing_root,
            job_id,
            session_id,
            filename,
            &format!("job_{}_{}", job_id, filename),
            bytes,
        )
    }

    fn save_into(
        &self,
        root: &Path,
        job_id: JobId,
        session_id: SessionId,
        filename: &str,
        basename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, FileError> {
        validate_filename(filename)?;

        let limit = self.tunables.lock().max_file_size_bytes;
        if bytes.len() as u64 > limit {
            return Err(FileError::TooLarge {
                filename: filename.to_string(),
                size: bytes.len() as u64,
                limit,
            });
        }

        let full_path = root.join(basename);
        self.ensure_contained(&full_path)?;

        if self.index.lock().contains_key(basename) {
            return Err(FileError::AlreadyExists(basename.to_string()));
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o644)
            .open(&full_path)
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::AlreadyExists => FileError::AlreadyExists(basename.to_string()),
                _ => FileError::Io { path: full_path.clone(), source },
            })?;
        if let Err(source) = file.write_all(bytes) {
            drop(file);
            let _ = std::fs::remove_file(&full_path);
            return Err(FileError::Io { path: full_path, source });
        }

        let now_ms = self.clock.epoch_ms();
        let info = FileInfo {
            job_id,
            session_id,
            basename: basename.to_string(),
            full_path: full_path.clone(),
            size: bytes.len() as u64,
            created_at_ms: now_ms,
            last_accessed_ms: now_ms,
            is_temporary: false,
        };
        self.index.lock().insert(basename.to_string(), info);

        debug!(job = %job_id, file = basename, size = bytes.len(), "saved file");
        Ok(full_path)
    }

    /// Read a tracked file back, touching `last_accessed`.
    pub fn load(&self, basename: &str) -> Result<Vec<u8>, FileError> {
        let full_path = {
            let index = self.index.lock();
            let entry = index
                .get(basename)
                .ok_or_else(|| FileError::NotFound(basename.to_string()))?;
            entry.full_path.clone()
        };
        self.ensure_contained(&full_path)?;

        let bytes = std::fs::read(&full_path)
            .map_err(|source| FileError::Io { path: full_path, source })?;

        let now_ms = self.clock.epoch_ms();
        if let Some(entry) = self.index.lock().get_mut(basename) {
            entry.last_accessed_ms = now_ms;
        }
        Ok(bytes)
    }

    /// Reserve a collision-free temporary name under the processing root
    /// and track it as sweepable.
    pub fn create_temp(&self, job_id: JobId, session_id: SessionId, suffix: &str) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        let now_ms = self.clock.epoch_ms();
        let basename = format!(
            "temp_{}_{}_{}.{}",
            now_ms / 1_000,
            std::process::id(),
            seq,
            suffix
        );
        let full_path = self.processing_root.join(&basename);
        let info = FileInfo {
            job_id,
            session_id,
            basename: basename.clone(),
            full_path: full_path.clone(),
            size: 0,
            created_at_ms: now_ms,
            last_accessed_ms: now_ms,
            is_temporary: true,
        };
        self.index.lock().insert(basename, info);
        full_path
    }

    /// Update a tracked entry's size after an external write.
    pub fn record_size(&self, basename: &str, size: u64) {
        if let Some(entry) = self.index.lock().get_mut(basename) {
            entry.size = size;
        }
    }

    /// Unlink every tracked file belonging to a job. Returns how many
    /// entries were removed.
    pub fn cleanup_job(&self, job_id: JobId) -> usize {
        let doomed: Vec<(String, PathBuf)> = {
            let index = self.index.lock();
            index
                .values()
                .filter(|e| e.job_id == job_id)
                .map(|e| (e.basename.clone(), e.full_path.clone()))
                .collect()
        };

        for (_, path) in &doomed {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to unlink job file");
                }
            }
        }

        let mut index = self.index.lock();
        for (basename, _) in &doomed {
            index.remove(basename);
        }
        doomed.len()
    }

    pub fn list_job(&self, job_id: JobId) -> Vec<FileInfo> {
        self.index
            .lock()
            .values()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect()
    }

    pub fn info(&self, basename: &str) -> Option<FileInfo> {
        self.index.lock().get(basename).cloned()
    }

    /// Number of tracked entries, for the stats snapshot.
    pub fn tracked_count(&self) -> u32 {
        self.index.lock().len() as u32
    }

    /// Current sweep cadence, read live from the tunables.
    pub fn cleanup_interval_secs(&self) -> u64 {
        self.tunables.lock().cleanup_interval_secs
    }

    /// Unlink temporary entries older than `temp_max_age_secs`. Candidates
    /// are collected under the lock, unlinked without it, then dropped from
    /// the index. Returns how many were swept.
    pub fn sweep_expired(&self) -> usize {
        let max_age_ms = self.tunables.lock().temp_max_age_secs * 1_000;
        let now_ms = self.clock.epoch_ms();

        let expired: Vec<(String, PathBuf)> = {
            let index = self.index.lock();
            index
                .values()
                .filter(|e| e.is_temporary && now_ms.saturating_sub(e.created_at_ms) > max_age_ms)
                .map(|e| (e.basename.clone(), e.full_path.clone()))
                .collect()
        };

        for (_, path) in &expired {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to unlink expired temp");
                }
            }
        }

        let mut index = self.index.lock();
        for (basename, _) in &expired {
            index.remove(basename);
        }
        expired.len()
    }

    /// Containment invariant: the path's directory must canonicalise to one
    /// of the managed roots.
    fn ensure_contained(&self, path: &Path) -> Result<(), FileError> {
        let parent = path
            .parent()
            .ok_or_else(|| FileError::OutsideRoots(path.to_path_buf()))?;
        let canonical = parent
            .canonicalize()
            .map_err(|source| FileError::Io { path: parent.to_path_buf(), source })?;
        if canonical == self.processing_root || canonical == self.outgoing_root {
            Ok(())
        } else {
            Err(FileError::OutsideRoots(path.to_path_buf()))
        }
    }
}

fn create_root(root: PathBuf) -> Result<PathBuf, FileError> {
    std::fs::create_dir_all(&root)
        .map_err(|source| FileError::Io { path: root.clone(), source })?;
    root.canonicalize()
        .map_err(|source| FileError::Io { path: root, source })
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
