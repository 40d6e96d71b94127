// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child-process supervision: capped output capture and wall-clock bounds.

use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use mill_core::limits::{MAX_CAPTURE_BYTES, TIMEOUT_EXIT_CODE};
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::ToolchainError;

/// Grace period for the drain tasks to observe EOF after the child exits.
/// A grandchild holding the pipe open must not wedge the supervisor.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// What one supervised command produced.
#[derive(Debug, Clone)]
pub struct Captured {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
    pub wall_ms: u64,
}

impl Captured {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }
}

/// Run `command` through `/bin/sh -c` in `cwd`, draining stdout and stderr
/// into 8 KiB-capped buffers. Bytes past the cap are read and discarded so
/// the child never blocks on a full pipe.
///
/// On timeout the child gets SIGKILL and the captured-so-far output is
/// returned with exit code 124. `on_spawn` receives the child pid so the
/// caller can target cancellation signals.
pub async fn run_supervised(
    command: &str,
    cwd: &Path,
    limit: Duration,
    on_spawn: impl FnOnce(u32),
) -> Result<Captured, ToolchainError> {
    let mut child = tokio::process::Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(ToolchainError::Spawn)?;

    if let Some(pid) = child.id() {
        on_spawn(pid);
    }

    let stdout_buf = Arc::new(Mutex::new(Vec::new()));
    let stderr_buf = Arc::new(Mutex::new(Vec::new()));
    let stdout_task = child.stdout.take().map(|r| spawn_drain(r, Arc::clone(&stdout_buf)));
    let stderr_task = child.stderr.take().map(|r| spawn_drain(r, Arc::clone(&stderr_buf)));

    let start = Instant::now();
    let (exit_code, timed_out) = match tokio::time::timeout(limit, child.wait()).await {
        Ok(Ok(status)) => (translate_exit(status), false),
        Ok(Err(e)) => {
            finish_drain(stdout_task).await;
            finish_drain(stderr_task).await;
            return Err(ToolchainError::Spawn(e));
        }
        Err(_) => {
            debug!(%command, "wall-clock limit hit, killing child");
            let _ = child.start_kill();
            let _ = child.wait().await;
            (TIMEOUT_EXIT_CODE, true)
        }
    };
    let wall_ms = start.elapsed().as_millis() as u64;

    finish_drain(stdout_task).await;
    finish_drain(stderr_task).await;

    let stdout = std::mem::take(&mut *stdout_buf.lock());
    let stderr = std::mem::take(&mut *stderr_buf.lock());

    Ok(Captured {
        exit_code,
        stdout,
        stderr,
        timed_out,
        wall_ms,
    })
}

/// `WIFEXITED → code`, `WIFSIGNALED → 128+signo`, anything else → −1.
fn translate_exit(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        code
    } else if let Some(signal) = status.signal() {
        128 + signal
    } else {
        -1
    }
}

fn spawn_drain(
    mut reader: impl AsyncReadExt + Unpin + Send + 'static,
    buf: Arc<Mutex<Vec<u8>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut chunk = [0u8; 1024];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let mut captured = buf.lock();
                    let room = MAX_CAPTURE_BYTES.saturating_sub(captured.len());
                    let take = room.min(n);
                    if take > 0 {
                        captured.extend_from_slice(&chunk[..take]);
                    }
                    // Past the cap: keep reading, drop the bytes.
                }
            }
        }
    })
}

async fn finish_drain(task: Option<JoinHandle<()>>) {
    if let Some(mut task) = task {
        if tokio::time::timeout(DRAIN_GRACE, &mut task).await.is_err() {
            // Captured bytes so far stay in the shared buffer.
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "supervise_tests.rs"]
mod tests;
