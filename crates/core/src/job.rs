// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and state machine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::language::Language;
use crate::limits::{DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY};
use crate::session::SessionId;

/// Process-unique job identifier. Never zero.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct JobId(u32);

impl JobId {
    /// Wrap a raw wire value. Zero is not a valid id.
    pub fn from_raw(raw: u32) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic allocator for [`JobId`]. Starts at 1 and never yields 0.
#[derive(Debug)]
pub struct JobIdAllocator {
    next: u32,
}

impl Default for JobIdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl JobIdAllocator {
    pub fn next(&mut self) -> JobId {
        let id = JobId(self.next);
        self.next = self.next.wrapping_add(1);
        if self.next == 0 {
            self.next = 1;
        }
        id
    }
}

/// What the client asked the service to do with the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    CompileOnly,
    CompileAndRun,
    InterpretOnly,
    SyntaxCheck,
}

impl JobMode {
    pub fn code(self) -> u8 {
        match self {
            JobMode::CompileOnly => 1,
            JobMode::CompileAndRun => 2,
            JobMode::InterpretOnly => 3,
            JobMode::SyntaxCheck => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => JobMode::CompileOnly,
            2 => JobMode::CompileAndRun,
            3 => JobMode::InterpretOnly,
            4 => JobMode::SyntaxCheck,
            _ => return None,
        })
    }
}

crate::simple_display! {
    JobMode {
        CompileOnly => "compile",
        CompileAndRun => "compile+run",
        InterpretOnly => "interpret",
        SyntaxCheck => "syntax-check",
    }
}

/// Job lifecycle. Terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled | JobState::Timeout
        )
    }

    pub fn code(self) -> u8 {
        match self {
            JobState::Queued => 0,
            JobState::Running => 1,
            JobState::Completed => 2,
            JobState::Failed => 3,
            JobState::Cancelled => 4,
            JobState::Timeout => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => JobState::Queued,
            1 => JobState::Running,
            2 => JobState::Completed,
            3 => JobState::Failed,
            4 => JobState::Cancelled,
            5 => JobState::Timeout,
            _ => return None,
        })
    }
}

crate::simple_display! {
    JobState {
        Queued => "queued",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
        Timeout => "timeout",
    }
}

/// A single unit of compile/run work, owned by the queue from submission
/// until garbage collection.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub owner: SessionId,
    pub language: Language,
    pub mode: JobMode,
    /// 1 (lowest) to 10 (highest).
    pub priority: u8,
    pub state: JobState,
    pub submitted_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub ended_at_ms: Option<u64>,
    pub source_path: PathBuf,
    pub compiler_args: String,
    pub execution_args: String,
    /// Pid of the toolchain child while the job is Running.
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub output_file: Option<String>,
    pub error_file: Option<String>,
    pub output_size: u32,
    pub error_size: u32,
    /// Failure detail attached when the job did not complete.
    pub error: Option<String>,
}

impl Job {
    pub fn new(
        id: JobId,
        owner: SessionId,
        language: Language,
        mode: JobMode,
        priority: u8,
        source_path: PathBuf,
        submitted_at_ms: u64,
    ) -> Self {
        Self {
            id,
            owner,
            language,
            mode,
            priority: clamp_priority(priority),
            state: JobState::Queued,
            submitted_at_ms,
            started_at_ms: None,
            ended_at_ms: None,
            source_path,
            compiler_args: String::new(),
            execution_args: String::new(),
            pid: None,
            exit_code: None,
            output_file: None,
            error_file: None,
            output_size: 0,
            error_size: 0,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Queued → Running. No-op if the job already left Queued.
    pub fn start(&mut self, now_ms: u64) -> bool {
        if self.state != JobState::Queued {
            return false;
        }
        self.state = JobState::Running;
        self.started_at_ms = Some(now_ms);
        true
    }

    /// Running → terminal. Ignored once terminal; terminal states never change.
    pub fn finish(&mut self, state: JobState, now_ms: u64) -> bool {
        debug_assert!(state.is_terminal());
        if self.is_terminal() {
            return false;
        }
        self.state = state;
        self.ended_at_ms = Some(now_ms);
        self.pid = None;
        true
    }

    /// Flip a still-queued job to Cancelled in place so the supervisor
    /// skips it. Returns false when the job already started.
    pub fn cancel_queued(&mut self, now_ms: u64) -> bool {
        if self.state != JobState::Queued {
            return false;
        }
        self.state = JobState::Cancelled;
        self.ended_at_ms = Some(now_ms);
        true
    }

    /// Coarse progress indicator for `JobStatus` replies.
    pub fn progress(&self) -> u8 {
        match self.state {
            JobState::Queued => 0,
            JobState::Running => 50,
            _ => 100,
        }
    }

    /// Total wall time, when the job has both started and ended.
    pub fn wall_time_ms(&self) -> Option<u64> {
        match (self.started_at_ms, self.ended_at_ms) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        }
    }
}

fn clamp_priority(priority: u8) -> u8 {
    if priority == 0 {
        DEFAULT_PRIORITY
    } else {
        priority.clamp(MIN_PRIORITY, MAX_PRIORITY)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
