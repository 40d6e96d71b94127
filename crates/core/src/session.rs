// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session record and protocol state machine.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Monotonic per-process session identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(u32);

impl SessionId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Protocol state of a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Accepted, no Hello yet.
    Connecting,
    /// Hello exchanged.
    Authenticated,
    /// Between operations.
    Idle,
    /// Mid file upload.
    Uploading,
    /// Has at least one non-terminal job.
    Processing,
    /// Marked for removal.
    Disconnecting,
}

impl SessionState {
    /// States from which a new operation (upload, compile) may begin.
    pub fn accepts_work(self) -> bool {
        matches!(self, SessionState::Authenticated | SessionState::Idle)
    }
}

crate::simple_display! {
    SessionState {
        Connecting => "connecting",
        Authenticated => "authenticated",
        Idle => "idle",
        Uploading => "uploading",
        Processing => "processing",
        Disconnecting => "disconnecting",
    }
}

/// Book-keeping for one transport connection. The socket itself is owned
/// exclusively by the connection task; this record is what the registry and
/// the admin plane observe.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub remote_addr: SocketAddr,
    pub state: SessionState,
    pub connected_at_ms: u64,
    pub last_activity_ms: u64,
    /// Self-reported in Hello.
    pub client_name: String,
    pub client_platform: String,
    pub active_jobs: u32,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl Session {
    pub fn new(id: SessionId, remote_addr: SocketAddr, now_ms: u64) -> Self {
        Self {
            id,
            remote_addr,
            state: SessionState::Connecting,
            connected_at_ms: now_ms,
            last_activity_ms: now_ms,
            client_name: String::new(),
            client_platform: String::new(),
            active_jobs: 0,
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.last_activity_ms = now_ms;
    }

    pub fn idle_for_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_activity_ms)
    }

    /// Record a finished job; drops back to Idle when none remain active.
    pub fn job_finished(&mut self) {
        self.active_jobs = self.active_jobs.saturating_sub(1);
        if self.active_jobs == 0 && self.state == SessionState::Processing {
            self.state = SessionState::Idle;
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
