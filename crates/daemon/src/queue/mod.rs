// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FIFO job queue with priority reorder, cancellation, and retention GC.
//!
//! Jobs live in a generational arena; submission order is a separate id
//! list. Terminal jobs stay in the structure until the retention grace
//! period passes so `result` fetches can read them back.

mod supervisor;

pub use supervisor::spawn_supervisor;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use mill_core::job::JobIdAllocator;
use mill_core::limits::MAX_QUEUE_JOBS;
use mill_core::{
    Arena, Clock, ErrorKind, Fault, Handle, Job, JobId, JobMode, JobState, Language, ServerStats,
    SessionId, Tunables,
};
use mill_files::FileManager;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Everything a `CompileRequest` contributes to a new job.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub language: Language,
    pub mode: JobMode,
    pub priority: u8,
    pub compiler_args: String,
    pub execution_args: String,
}

struct QueueInner {
    arena: Arena<Job>,
    by_id: HashMap<JobId, Handle>,
    /// Submission order of every retained job, terminal ones included.
    order: Vec<JobId>,
    ids: JobIdAllocator,
    /// Jobs whose running child has been signalled; the supervisor maps
    /// their outcome to Cancelled.
    cancel_requested: HashSet<JobId>,
}

pub struct JobQueue<C: Clock> {
    clock: C,
    stats: Arc<ServerStats>,
    tunables: Arc<Mutex<Tunables>>,
    inner: Mutex<QueueInner>,
    wakeup: Notify,
}

impl<C: Clock> JobQueue<C> {
    pub fn new(clock: C, stats: Arc<ServerStats>, tunables: Arc<Mutex<Tunables>>) -> Self {
        Self {
            clock,
            stats,
            tunables,
            inner: Mutex::new(QueueInner {
                arena: Arena::new(),
                by_id: HashMap::new(),
                order: Vec::new(),
                ids: JobIdAllocator::default(),
                cancel_requested: HashSet::new(),
            }),
            wakeup: Notify::new(),
        }
    }

    /// Submit a job. `materialize` turns the allocated id into the job's
    /// source path (writing the uploaded bytes under that id); it runs
    /// outside the queue lock.
    pub fn submit(
        &self,
        owner: SessionId,
        request: SubmitRequest,
        materialize: impl FnOnce(JobId) -> Result<PathBuf, Fault>,
    ) -> Result<JobId, Fault> {
        let id = {
            let mut inner = self.inner.lock();
            if inner.order.len() >= MAX_QUEUE_JOBS {
                return Err(Fault::new(
                    ErrorKind::QuotaExceeded,
                    format!("queue is at its {MAX_QUEUE_JOBS} entry cap"),
                    "submit",
                ));
            }
            inner.ids.next()
        };

        let source_path = materialize(id)?;

        let job = {
            let mut job = Job::new(
                id,
                owner,
                request.language,
                request.mode,
                request.priority,
                source_path,
                self.clock.epoch_ms(),
            );
            job.compiler_args = request.compiler_args;
            job.execution_args = request.execution_args;
            job
        };

        let mut inner = self.inner.lock();
        let handle = inner.arena.insert(job);
        inner.by_id.insert(id, handle);
        inner.order.push(id);
        drop(inner);

        self.stats.job_submitted();
        self.wakeup.notify_one();
        debug!(job = %id, session = %owner, "job queued");
        Ok(id)
    }

    /// Pop the first still-queued job, flipping it to Running. Returns a
    /// clone for the supervisor to execute.
    pub fn claim_next(&self) -> Option<Job> {
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let order = inner.order.clone();
        for id in order {
            let Some(&handle) = inner.by_id.get(&id) else { continue };
            let Some(job) = inner.arena.get_mut(handle) else { continue };
            if job.state == JobState::Queued {
                job.start(now_ms);
                return Some(job.clone());
            }
        }
        None
    }

    /// Record the running child's pid for cancellation targeting.
    pub fn record_pid(&self, id: JobId, pid: u32) {
        let mut inner = self.inner.lock();
        if let Some(&handle) = inner.by_id.get(&id) {
            if let Some(job) = inner.arena.get_mut(handle) {
                if job.state == JobState::Running {
                    job.pid = Some(pid);
                }
            }
        }
    }

    /// Apply a terminal outcome. Only the supervisor calls this. Returns
    /// the finalized job.
    pub fn finalize(
        &self,
        id: JobId,
        mut state: JobState,
        exit_code: i32,
        output: (Option<String>, u32),
        error_output: (Option<String>, u32),
        error: Option<String>,
    ) -> Option<Job> {
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.lock();

        // A cancel observed while the job ran wins over plain failure;
        // a wall-clock timeout keeps its own state.
        if inner.cancel_requested.remove(&id) && state != JobState::Timeout {
            state = JobState::Cancelled;
        }

        let &handle = inner.by_id.get(&id)?;
        let job = inner.arena.get_mut(handle)?;
        job.exit_code = Some(exit_code);
        job.output_file = output.0;
        job.output_size = output.1;
        job.error_file = error_output.0;
        job.error_size = error_output.1;
        job.error = error;
        if !job.finish(state, now_ms) {
            return Some(job.clone());
        }
        let finished = job.clone();
        drop(inner);

        self.stats.job_finished(finished.state, finished.wall_time_ms());
        info!(job = %id, state = %finished.state, exit = exit_code, "job finished");
        Some(finished)
    }

    /// Cancel a job. Queued jobs flip to Cancelled in place; running jobs
    /// get SIGTERM (SIGKILL when `force`) and are finalized by the
    /// supervisor when the child is reaped.
    pub fn cancel(&self, id: JobId, force: bool) -> Result<(), Fault> {
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let &handle = inner
            .by_id
            .get(&id)
            .ok_or_else(|| Fault::not_found(format!("no job {id}"), "cancel"))?;
        let Some(job) = inner.arena.get_mut(handle) else {
            return Err(Fault::not_found(format!("no job {id}"), "cancel"));
        };

        match job.state {
            JobState::Queued => {
                job.cancel_queued(now_ms);
                let wall = job.wall_time_ms();
                drop(inner);
                self.stats.job_finished(JobState::Cancelled, wall);
                info!(job = %id, "queued job cancelled");
                Ok(())
            }
            JobState::Running => {
                let pid = job.pid;
                inner.cancel_requested.insert(id);
                drop(inner);
                if let Some(pid) = pid {
                    let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
                    if let Err(e) = kill(Pid::from_raw(pid as i32), signal) {
                        warn!(job = %id, pid, error = %e, "failed to signal job child");
                    }
                }
                info!(job = %id, force, "running job signalled for cancel");
                Ok(())
            }
            _ => Err(Fault::invalid(format!("job {id} is already terminal"), "cancel")),
        }
    }

    /// Cancel every non-terminal job owned by a session. Returns how many
    /// were cancelled.
    pub fn cancel_all_for_session(&self, session: SessionId, force: bool) -> usize {
        let ids: Vec<JobId> = {
            let inner = self.inner.lock();
            inner
                .arena
                .iter()
                .filter(|(_, job)| job.owner == session && !job.is_terminal())
                .map(|(_, job)| job.id)
                .collect()
        };
        let mut cancelled = 0;
        for id in ids {
            if self.cancel(id, force).is_ok() {
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn find(&self, id: JobId) -> Option<Job> {
        let inner = self.inner.lock();
        let &handle = inner.by_id.get(&id)?;
        inner.arena.get(handle).cloned()
    }

    pub fn list_for(&self, session: SessionId) -> Vec<Job> {
        let inner = self.inner.lock();
        inner
            .arena
            .iter()
            .filter(|(_, job)| job.owner == session)
            .map(|(_, job)| job.clone())
            .collect()
    }

    pub fn list_all(&self) -> Vec<Job> {
        let inner = self.inner.lock();
        let mut jobs: Vec<Job> = Vec::with_capacity(inner.order.len());
        for id in &inner.order {
            if let Some(&handle) = inner.by_id.get(id) {
                if let Some(job) = inner.arena.get(handle) {
                    jobs.push(job.clone());
                }
            }
        }
        jobs
    }

    /// Number of queued entries ahead of this job.
    pub fn queue_position(&self, id: JobId) -> u32 {
        let inner = self.inner.lock();
        let mut position = 0;
        for other in &inner.order {
            if *other == id {
                break;
            }
            if let Some(&handle) = inner.by_id.get(other) {
                if let Some(job) = inner.arena.get(handle) {
                    if !job.is_terminal() {
                        position += 1;
                    }
                }
            }
        }
        position
    }

    /// Preceding active entries × mean job wall time.
    pub fn estimated_wait_ms(&self, id: JobId) -> u64 {
        u64::from(self.queue_position(id)) * self.stats.mean_job_wall_ms()
    }

    /// Bubble higher-priority jobs ahead of lower ones, touching only runs
    /// of consecutive Queued entries. Running and terminal entries hold
    /// their positions.
    pub fn reorder_by_priority(&self) {
        let mut inner = self.inner.lock();
        let states: HashMap<JobId, (JobState, u8)> = inner
            .arena
            .iter()
            .map(|(_, job)| (job.id, (job.state, job.priority)))
            .collect();

        let order = &mut inner.order;
        let mut run_start = None;
        for i in 0..=order.len() {
            let queued = order
                .get(i)
                .and_then(|id| states.get(id))
                .map(|(state, _)| *state == JobState::Queued)
                .unwrap_or(false);
            match (queued, run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(start)) => {
                    bubble_by_priority(&mut order[start..i], &states);
                    run_start = None;
                }
                _ => {}
            }
        }
    }

    /// Drop terminal jobs older than the retention grace period, cleaning
    /// their files. Returns how many were collected.
    pub fn collect_garbage(&self, files: &FileManager<C>) -> usize {
        let retention_ms = self.tunables.lock().job_retention_secs * 1_000;
        let now_ms = self.clock.epoch_ms();

        let expired: Vec<JobId> = {
            let inner = self.inner.lock();
            inner
                .arena
                .iter()
                .filter(|(_, job)| {
                    job.is_terminal()
                        && job
                            .ended_at_ms
                            .map(|end| now_ms.saturating_sub(end) > retention_ms)
                            .unwrap_or(false)
                })
                .map(|(_, job)| job.id)
                .collect()
        };

        for &id in &expired {
            files.cleanup_job(id);
            let mut inner = self.inner.lock();
            if let Some(handle) = inner.by_id.remove(&id) {
                inner.arena.remove(handle);
            }
            inner.order.retain(|other| *other != id);
            inner.cancel_requested.remove(&id);
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "garbage-collected terminal jobs");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wake the supervisor (submission, shutdown, admin reorder).
    pub fn notify(&self) {
        self.wakeup.notify_one();
    }

    pub(crate) async fn notified(&self) {
        self.wakeup.notified().await;
    }
}

/// Stable bubble pass: higher priority first within the slice.
fn bubble_by_priority(slice: &mut [JobId], states: &HashMap<JobId, (JobState, u8)>) {
    let priority = |id: &JobId| states.get(id).map(|(_, p)| *p).unwrap_or(0);
    let len = slice.len();
    for i in 0..len {
        for j in 0..len.saturating_sub(i + 1) {
            if priority(&slice[j]) < priority(&slice[j + 1]) {
                slice.swap(j, j + 1);
            }
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
