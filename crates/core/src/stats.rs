// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide statistics aggregate.
//!
//! Mutation happens only through the typed recording methods, each of which
//! takes the dedicated mutex for the duration of one field update. Readers
//! get an owned [`ServerStatsSnapshot`], never a live reference.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::job::JobState;

const EMA_ALPHA: f64 = 0.2;

/// Exponential moving average, seeded by the first observation.
#[derive(Debug, Clone, Copy, Default)]
struct Ema {
    value: Option<f64>,
}

impl Ema {
    fn observe(&mut self, sample: f64) {
        self.value = Some(match self.value {
            Some(prev) => prev + EMA_ALPHA * (sample - prev),
            None => sample,
        });
    }

    fn as_ms(&self) -> u64 {
        self.value.unwrap_or(0.0).round() as u64
    }
}

#[derive(Debug, Default)]
struct StatsInner {
    total_sessions: u32,
    active_sessions: u32,
    total_jobs: u32,
    active_jobs: u32,
    completed_jobs: u32,
    failed_jobs: u32,
    cancelled_jobs: u32,
    timeout_jobs: u32,
    bytes_in: u64,
    bytes_out: u64,
    successful_compilations: u32,
    failed_compilations: u32,
    successful_executions: u32,
    failed_executions: u32,
    job_wall: Ema,
    compile_wall: Ema,
    exec_wall: Ema,
    admin_commands: u32,
}

/// Shared statistics handle.
pub struct ServerStats {
    start_epoch_ms: u64,
    inner: Mutex<StatsInner>,
}

impl ServerStats {
    pub fn new(start_epoch_ms: u64) -> Self {
        Self { start_epoch_ms, inner: Mutex::new(StatsInner::default()) }
    }

    pub fn session_opened(&self) {
        let mut inner = self.inner.lock();
        inner.total_sessions += 1;
        inner.active_sessions += 1;
    }

    pub fn session_closed(&self) {
        let mut inner = self.inner.lock();
        inner.active_sessions = inner.active_sessions.saturating_sub(1);
    }

    pub fn job_submitted(&self) {
        let mut inner = self.inner.lock();
        inner.total_jobs += 1;
        inner.active_jobs += 1;
    }

    /// Record a job reaching a terminal state.
    pub fn job_finished(&self, state: JobState, wall_ms: Option<u64>) {
        debug_assert!(state.is_terminal());
        let mut inner = self.inner.lock();
        inner.active_jobs = inner.active_jobs.saturating_sub(1);
        match state {
            JobState::Completed => inner.completed_jobs += 1,
            JobState::Failed => inner.failed_jobs += 1,
            JobState::Cancelled => inner.cancelled_jobs += 1,
            JobState::Timeout => inner.timeout_jobs += 1,
            JobState::Queued | JobState::Running => {}
        }
        if let Some(ms) = wall_ms {
            inner.job_wall.observe(ms as f64);
        }
    }

    pub fn add_bytes_in(&self, n: u64) {
        self.inner.lock().bytes_in += n;
    }

    pub fn add_bytes_out(&self, n: u64) {
        self.inner.lock().bytes_out += n;
    }

    pub fn compilation_finished(&self, success: bool, wall_ms: u64) {
        let mut inner = self.inner.lock();
        if success {
            inner.successful_compilations += 1;
        } else {
            inner.failed_compilations += 1;
        }
        inner.compile_wall.observe(wall_ms as f64);
    }

    pub fn execution_finished(&self, success: bool, wall_ms: u64) {
        let mut inner = self.inner.lock();
        if success {
            inner.successful_executions += 1;
        } else {
            inner.failed_executions += 1;
        }
        inner.exec_wall.observe(wall_ms as f64);
    }

    pub fn admin_command(&self) {
        self.inner.lock().admin_commands += 1;
    }

    /// Mean job wall time, used for queue wait estimates. Zero until the
    /// first job finishes.
    pub fn mean_job_wall_ms(&self) -> u64 {
        self.inner.lock().job_wall.as_ms()
    }

    /// Owned snapshot for admin replies. `files_tracked` comes from the file
    /// manager; it is not mutated through this type.
    pub fn snapshot(&self, now_ms: u64, files_tracked: u32) -> ServerStatsSnapshot {
        let inner = self.inner.lock();
        ServerStatsSnapshot {
            start_epoch_ms: self.start_epoch_ms,
            uptime_ms: now_ms.saturating_sub(self.start_epoch_ms),
            total_sessions: inner.total_sessions,
            active_sessions: inner.active_sessions,
            total_jobs: inner.total_jobs,
            active_jobs: inner.active_jobs,
            completed_jobs: inner.completed_jobs,
            failed_jobs: inner.failed_jobs,
            cancelled_jobs: inner.cancelled_jobs,
            timeout_jobs: inner.timeout_jobs,
            bytes_in: inner.bytes_in,
            bytes_out: inner.bytes_out,
            successful_compilations: inner.successful_compilations,
            failed_compilations: inner.failed_compilations,
            successful_executions: inner.successful_executions,
            failed_executions: inner.failed_executions,
            avg_job_ms: inner.job_wall.as_ms(),
            avg_compile_ms: inner.compile_wall.as_ms(),
            avg_exec_ms: inner.exec_wall.as_ms(),
            files_tracked,
            admin_commands: inner.admin_commands,
        }
    }
}

/// Point-in-time copy of the statistics aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatsSnapshot {
    pub start_epoch_ms: u64,
    pub uptime_ms: u64,
    pub total_sessions: u32,
    pub active_sessions: u32,
    pub total_jobs: u32,
    pub active_jobs: u32,
    pub completed_jobs: u32,
    pub failed_jobs: u32,
    pub cancelled_jobs: u32,
    pub timeout_jobs: u32,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub successful_compilations: u32,
    pub failed_compilations: u32,
    pub successful_executions: u32,
    pub failed_executions: u32,
    pub avg_job_ms: u64,
    pub avg_compile_ms: u64,
    pub avg_exec_ms: u64,
    pub files_tracked: u32,
    pub admin_commands: u32,
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
