// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single worker that drains the queue.

use std::sync::Arc;
use std::time::Duration;

use mill_core::{Clock, Job};
use mill_toolchain::Executor;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::context::Ctx;

/// Spawn the queue supervisor. One instance per process; only it moves
/// jobs out of Queued and into a terminal state (cancellation of queued
/// entries aside).
pub fn spawn_supervisor<C>(ctx: Arc<Ctx<C>>, executor: Arc<Executor<C>>) -> JoinHandle<()>
where
    C: Clock + 'static,
{
    tokio::spawn(async move {
        loop {
            if ctx.shutdown.is_cancelled() {
                debug!("supervisor observed shutdown; draining stops");
                break;
            }
            match ctx.queue.claim_next() {
                Some(job) => process_job(&ctx, &executor, job).await,
                None => {
                    // Idle: GC terminal jobs, then wait for a submission,
                    // shutdown, or the periodic re-check tick.
                    ctx.queue.collect_garbage(&ctx.files);
                    tokio::select! {
                        _ = ctx.shutdown.cancelled() => break,
                        _ = ctx.queue.notified() => {}
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }
    })
}

/// Run one claimed job to its terminal state and publish the results.
async fn process_job<C: Clock>(ctx: &Arc<Ctx<C>>, executor: &Executor<C>, job: Job) {
    let queue = Arc::clone(&ctx.queue);
    let job_id = job.id;
    let outcome = executor
        .run_job(&job, move |pid| queue.record_pid(job_id, pid))
        .await;

    // Persist captured output as outgoing artefacts; sizes come from what
    // was actually written.
    let output = save_artefact(ctx, &job, "stdout.txt", &outcome.stdout);
    let error_output = save_artefact(ctx, &job, "stderr.txt", &outcome.stderr);

    let finished = ctx.queue.finalize(
        job.id,
        outcome.state,
        outcome.exit_code,
        output,
        error_output,
        outcome.error,
    );

    if finished.is_none() {
        error!(job = %job.id, "finalize lost the job record");
    }
    ctx.sessions.job_finished(job.owner);
}

fn save_artefact<C: Clock>(
    ctx: &Ctx<C>,
    job: &Job,
    name: &str,
    bytes: &[u8],
) -> (Option<String>, u32) {
    if bytes.is_empty() {
        return (None, 0);
    }
    match ctx.files.save_artefact(job.id, job.owner, name, bytes) {
        Ok(_) => (Some(format!("job_{}_{}", job.id, name)), bytes.len() as u32),
        Err(e) => {
            error!(job = %job.id, artefact = name, error = %e, "failed to save artefact");
            (None, 0)
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
