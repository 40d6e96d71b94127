// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: fixed paths and endpoints plus the closed set of
//! runtime-settable tunables exposed through the admin `Config*` commands.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Fault;

/// Static configuration resolved at startup. Tunables start from
/// [`Tunables::default`] and may change at runtime via the admin plane.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP endpoint for client sessions.
    pub listen_addr: SocketAddr,
    /// Filesystem rendezvous point for the admin plane.
    pub admin_socket_path: PathBuf,
    /// Root for per-job sandboxes and uploaded sources.
    pub processing_root: PathBuf,
    /// Root for result artefacts.
    pub outgoing_root: PathBuf,
    /// Lock/PID file guarding single-instance startup.
    pub lock_path: PathBuf,
    pub tunables: Tunables,
}

impl Config {
    /// Configuration rooted at a state directory, with default endpoints.
    pub fn rooted_at(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            admin_socket_path: state_dir.join("admin.sock"),
            processing_root: state_dir.join("processing"),
            outgoing_root: state_dir.join("outgoing"),
            lock_path: state_dir.join("milld.pid"),
            tunables: Tunables::default(),
        }
    }
}

/// Runtime-settable knobs. Every field has a matching [`ConfigKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tunables {
    pub client_timeout_secs: u64,
    pub admin_timeout_secs: u64,
    pub max_file_size_bytes: u64,
    /// Grace period before a terminal job is garbage-collected.
    pub job_retention_secs: u64,
    pub temp_max_age_secs: u64,
    pub cleanup_interval_secs: u64,
    pub max_active_jobs_per_session: u64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            client_timeout_secs: 300,
            admin_timeout_secs: 1_800,
            max_file_size_bytes: 8 * 1024 * 1024,
            job_retention_secs: 3_600,
            temp_max_age_secs: 24 * 3_600,
            cleanup_interval_secs: 3_600,
            max_active_jobs_per_session: 4,
        }
    }
}

impl Tunables {
    pub fn get(&self, key: ConfigKey) -> u64 {
        match key {
            ConfigKey::ClientTimeoutSecs => self.client_timeout_secs,
            ConfigKey::AdminTimeoutSecs => self.admin_timeout_secs,
            ConfigKey::MaxFileSizeBytes => self.max_file_size_bytes,
            ConfigKey::JobRetentionSecs => self.job_retention_secs,
            ConfigKey::TempMaxAgeSecs => self.temp_max_age_secs,
            ConfigKey::CleanupIntervalSecs => self.cleanup_interval_secs,
            ConfigKey::MaxActiveJobsPerSession => self.max_active_jobs_per_session,
        }
    }

    /// Set a tunable after range validation.
    pub fn set(&mut self, key: ConfigKey, value: u64) -> Result<(), Fault> {
        let (min, max) = key.range();
        if value < min || value > max {
            return Err(Fault::invalid(
                format!("{} must be in {}..={}, got {}", key.name(), min, max, value),
                "config_set",
            ));
        }
        match key {
            ConfigKey::ClientTimeoutSecs => self.client_timeout_secs = value,
            ConfigKey::AdminTimeoutSecs => self.admin_timeout_secs = value,
            ConfigKey::MaxFileSizeBytes => self.max_file_size_bytes = value,
            ConfigKey::JobRetentionSecs => self.job_retention_secs = value,
            ConfigKey::TempMaxAgeSecs => self.temp_max_age_secs = value,
            ConfigKey::CleanupIntervalSecs => self.cleanup_interval_secs = value,
            ConfigKey::MaxActiveJobsPerSession => self.max_active_jobs_per_session = value,
        }
        Ok(())
    }
}

/// The closed whitelist of admin-settable keys. An unknown name is an
/// `InvalidArgument` fault, never a dynamic lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKey {
    ClientTimeoutSecs,
    AdminTimeoutSecs,
    MaxFileSizeBytes,
    JobRetentionSecs,
    TempMaxAgeSecs,
    CleanupIntervalSecs,
    MaxActiveJobsPerSession,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 7] = [
        ConfigKey::ClientTimeoutSecs,
        ConfigKey::AdminTimeoutSecs,
        ConfigKey::MaxFileSizeBytes,
        ConfigKey::JobRetentionSecs,
        ConfigKey::TempMaxAgeSecs,
        ConfigKey::CleanupIntervalSecs,
        ConfigKey::MaxActiveJobsPerSession,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::ClientTimeoutSecs => "client_timeout_secs",
            ConfigKey::AdminTimeoutSecs => "admin_timeout_secs",
            ConfigKey::MaxFileSizeBytes => "max_file_size_bytes",
            ConfigKey::JobRetentionSecs => "job_retention_secs",
            ConfigKey::TempMaxAgeSecs => "temp_max_age_secs",
            ConfigKey::CleanupIntervalSecs => "cleanup_interval_secs",
            ConfigKey::MaxActiveJobsPerSession => "max_active_jobs_per_session",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.name() == name)
    }

    /// Inclusive validation range for [`Tunables::set`].
    pub fn range(self) -> (u64, u64) {
        match self {
            ConfigKey::ClientTimeoutSecs => (5, 86_400),
            ConfigKey::AdminTimeoutSecs => (5, 86_400),
            ConfigKey::MaxFileSizeBytes => (1_024, 16 * 1024 * 1024),
            ConfigKey::JobRetentionSecs => (0, 30 * 86_400),
            ConfigKey::TempMaxAgeSecs => (60, 30 * 86_400),
            ConfigKey::CleanupIntervalSecs => (10, 30 * 86_400),
            ConfigKey::MaxActiveJobsPerSession => (1, 100),
        }
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
