// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime shell: process-wide init, worker spawning, shutdown fan-out.

use std::fs::File;
use std::io::Write;
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use parking_lot::Mutex;
use mill_core::{Clock, Config, ServerStats, SystemClock};
use mill_files::{spawn_sweeper, FileManager};
use mill_toolchain::{CompilerRegistry, ExecLimits, Executor};
use thiserror::Error;
use tokio::net::{TcpListener, UnixListener};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::admin::spawn_admin;
use crate::context::Ctx;
use crate::queue::{spawn_supervisor, JobQueue};
use crate::sessions::{spawn_listener, SessionRegistry};

/// Initialisation failures. All are fatal; the process exits non-zero.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("no compiler or interpreter detected on PATH")]
    NoToolchains,

    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind {0}: {1}")]
    BindTcp(SocketAddr, #[source] std::io::Error),

    #[error("failed to bind admin socket at {0}: {1}")]
    BindAdmin(PathBuf, #[source] std::io::Error),

    #[error("file manager: {0}")]
    Files(#[from] mill_files::FileError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pluggable pieces of the runtime: the probed toolchains and the
/// execution wall-clock bounds. Tests inject both.
pub struct DaemonDeps {
    pub registry: Arc<CompilerRegistry>,
    pub limits: ExecLimits,
}

impl DaemonDeps {
    /// Production wiring: probe `PATH`, fail when nothing is found.
    pub async fn probe() -> Result<Self, InitError> {
        let registry = CompilerRegistry::probe().await;
        if registry.is_empty() {
            return Err(InitError::NoToolchains);
        }
        Ok(Self { registry: Arc::new(registry), limits: ExecLimits::default() })
    }
}

/// A started daemon: four worker tasks plus the signal watcher.
pub struct RunningDaemon {
    ctx: Arc<Ctx<SystemClock>>,
    local_addr: SocketAddr,
    tasks: Vec<JoinHandle<()>>,
    // NOTE(lifetime): held to keep the exclusive lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

impl std::fmt::Debug for RunningDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningDaemon").field("local_addr", &self.local_addr).finish_non_exhaustive()
    }
}

/// Bring the service up: directories, lock file, listeners, workers.
pub async fn start(config: Config, deps: DaemonDeps) -> Result<RunningDaemon, InitError> {
    if deps.registry.is_empty() {
        return Err(InitError::NoToolchains);
    }

    if let Some(parent) = config.lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Some(parent) = config.admin_socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Lock first so a second instance cannot race directory setup. Opened
    // without truncation so a losing contender does not wipe the winner's
    // pid.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(InitError::LockFailed)?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    let clock = SystemClock;
    let tunables = Arc::new(Mutex::new(config.tunables));
    let stats = Arc::new(ServerStats::new(clock.epoch_ms()));
    let files = Arc::new(FileManager::new(
        &config.processing_root,
        &config.outgoing_root,
        Arc::clone(&tunables),
        clock.clone(),
    )?);
    // Jobs do not survive a restart, so any sandbox directory still on
    // disk is an orphan from a previous run (e.g. a worker that died
    // between sandbox creation and removal).
    let stale = sweep_sandboxes(files.processing_root());
    if stale > 0 {
        warn!(stale, "removed stale sandbox directories from a previous run");
    }

    let sessions = Arc::new(SessionRegistry::new(clock.clone(), Arc::clone(&stats)));
    let queue = Arc::new(JobQueue::new(
        clock.clone(),
        Arc::clone(&stats),
        Arc::clone(&tunables),
    ));

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|e| InitError::BindTcp(config.listen_addr, e))?;
    let local_addr = listener.local_addr()?;

    if config.admin_socket_path.exists() {
        std::fs::remove_file(&config.admin_socket_path)?;
    }
    let admin_listener = UnixListener::bind(&config.admin_socket_path)
        .map_err(|e| InitError::BindAdmin(config.admin_socket_path.clone(), e))?;
    std::fs::set_permissions(
        &config.admin_socket_path,
        std::fs::Permissions::from_mode(0o600),
    )?;

    let executor = Arc::new(Executor::new(
        Arc::clone(&deps.registry),
        files.processing_root(),
        deps.limits,
        Arc::clone(&stats),
        clock.clone(),
    ));

    let ctx = Arc::new(Ctx {
        config,
        tunables,
        clock,
        stats,
        files,
        registry: deps.registry,
        sessions,
        queue,
        shutdown: tokio_util::sync::CancellationToken::new(),
    });

    let tasks = vec![
        watch_worker("sessions", &ctx, spawn_listener(Arc::clone(&ctx), listener)),
        watch_worker("admin", &ctx, spawn_admin(Arc::clone(&ctx), admin_listener)),
        watch_worker("supervisor", &ctx, spawn_supervisor(Arc::clone(&ctx), executor)),
        watch_worker(
            "sweeper",
            &ctx,
            spawn_sweeper(Arc::clone(&ctx.files), ctx.shutdown.clone()),
        ),
        spawn_signal_watcher(Arc::clone(&ctx)),
    ];

    info!(addr = %local_addr, admin = %ctx.config.admin_socket_path.display(), "daemon started");
    Ok(RunningDaemon { ctx, local_addr, tasks, lock_file })
}

/// Remove per-job `job_*` sandbox directories under the processing root.
/// Uploaded sources are plain files under the same root and are left to
/// the file manager's retention GC.
fn sweep_sandboxes(processing_root: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(processing_root) else { return 0 };
    let mut removed = 0;
    for entry in entries.flatten() {
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with("job_") {
            continue;
        }
        match std::fs::remove_dir_all(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(dir = %entry.path().display(), error = %e, "failed to remove sandbox");
            }
        }
    }
    removed
}

/// A worker that dies by panic must not leave the process half-alive:
/// the shutdown event fires so every other loop winds down.
fn watch_worker<C: Clock + 'static>(
    name: &'static str,
    ctx: &Arc<Ctx<C>>,
    task: JoinHandle<()>,
) -> JoinHandle<()> {
    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        if let Err(e) = task.await {
            if e.is_panic() {
                error!(worker = name, "worker panicked; initiating shutdown");
                ctx.shutdown.cancel();
                ctx.queue.notify();
            }
        }
    })
}

/// SIGINT/SIGTERM set the global shutdown event.
fn spawn_signal_watcher<C: Clock + 'static>(ctx: Arc<Ctx<C>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let mut interrupt = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to install SIGINT handler");
                return;
            }
        };
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            _ = ctx.shutdown.cancelled() => return,
            _ = interrupt.recv() => info!("SIGINT received"),
            _ = terminate.recv() => info!("SIGTERM received"),
        }
        ctx.shutdown.cancel();
        ctx.queue.notify();
    })
}

impl RunningDaemon {
    /// Bound client endpoint (useful with a port-0 config).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn admin_socket_path(&self) -> &Path {
        &self.ctx.config.admin_socket_path
    }

    /// Trigger shutdown programmatically.
    pub fn trigger_shutdown(&self) {
        self.ctx.shutdown.cancel();
        self.ctx.queue.notify();
    }

    /// Block until the shutdown event fires, then tear everything down.
    pub async fn wait(self) {
        self.ctx.shutdown.cancelled().await;
        self.ctx.queue.notify();

        for task in self.tasks {
            if tokio::time::timeout(Duration::from_secs(10), task).await.is_err() {
                warn!("worker did not stop within the join timeout");
            }
        }

        // The supervisor has stopped, so every remaining sandbox is trash.
        let swept = sweep_sandboxes(self.ctx.files.processing_root());
        if swept > 0 {
            warn!(swept, "swept leftover sandbox directories");
        }

        if self.ctx.config.admin_socket_path.exists() {
            let _ = std::fs::remove_file(&self.ctx.config.admin_socket_path);
        }
        let _ = std::fs::remove_file(&self.ctx.config.lock_path);
        info!("daemon shutdown complete");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
