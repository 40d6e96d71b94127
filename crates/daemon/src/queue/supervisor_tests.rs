// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use mill_core::{FakeClock, JobState, SessionState};
use mill_toolchain::ExecLimits;

use super::*;
use crate::test_helpers::test_ctx;

fn make_executor(ctx: &Ctx<FakeClock>, limits: ExecLimits) -> Arc<Executor<FakeClock>> {
    Arc::new(Executor::new(
        Arc::clone(&ctx.registry),
        ctx.files.processing_root(),
        limits,
        Arc::clone(&ctx.stats),
        ctx.clock.clone(),
    ))
}

fn submit_script(ctx: &Ctx<FakeClock>, owner: u32, script: &[u8]) -> mill_core::JobId {
    let session = mill_core::SessionId::from_raw(owner);
    ctx.queue
        .submit(
            session,
            crate::queue::SubmitRequest {
                language: mill_core::Language::Python,
                mode: mill_core::JobMode::InterpretOnly,
                priority: 5,
                compiler_args: String::new(),
                execution_args: String::new(),
            },
            |id| {
                ctx.files
                    .save_uploaded(id, session, "script.py", script)
                    .map_err(|e| e.to_fault())
            },
        )
        .unwrap()
}

async fn wait_terminal(
    ctx: &Ctx<FakeClock>,
    id: mill_core::JobId,
    within: Duration,
) -> mill_core::Job {
    let deadline = std::time::Instant::now() + within;
    loop {
        if let Some(job) = ctx.queue.find(id) {
            if job.is_terminal() {
                return job;
            }
        }
        assert!(std::time::Instant::now() < deadline, "job {id} never became terminal");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn drains_a_job_to_completed_with_artefacts() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _) = test_ctx(dir.path());
    let (sid, _) = ctx.sessions.admit("127.0.0.1:1".parse().unwrap());
    ctx.sessions.with(sid, |s| {
        s.state = SessionState::Processing;
        s.active_jobs = 1;
    });

    let id = submit_script(&ctx, sid.as_u32(), b"echo hi\n");
    let handle = spawn_supervisor(Arc::clone(&ctx), make_executor(&ctx, ExecLimits::default()));

    let job = wait_terminal(&ctx, id, Duration::from_secs(10)).await;
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.exit_code, Some(0));
    assert_eq!(job.output_size, 3);
    assert_eq!(ctx.files.load(job.output_file.as_deref().unwrap()).unwrap(), b"hi\n");

    // The owner session dropped back to Idle.
    assert_eq!(ctx.sessions.get(sid).unwrap().state, SessionState::Idle);

    ctx.shutdown.cancel();
    ctx.queue.notify();
    handle.await.unwrap();
}

#[tokio::test]
async fn failed_job_keeps_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _) = test_ctx(dir.path());
    let id = submit_script(&ctx, 1, b"echo broken >&2\nexit 2\n");
    let handle = spawn_supervisor(Arc::clone(&ctx), make_executor(&ctx, ExecLimits::default()));

    let job = wait_terminal(&ctx, id, Duration::from_secs(10)).await;
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.exit_code, Some(2));
    assert_eq!(ctx.files.load(job.error_file.as_deref().unwrap()).unwrap(), b"broken\n");

    ctx.shutdown.cancel();
    ctx.queue.notify();
    handle.await.unwrap();
}

#[tokio::test]
async fn wall_clock_timeout_reaches_timeout_state() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _) = test_ctx(dir.path());
    let id = submit_script(&ctx, 1, b"sleep 30\n");
    let limits = ExecLimits {
        compile: Duration::from_secs(5),
        execute: Duration::from_millis(300),
    };
    let handle = spawn_supervisor(Arc::clone(&ctx), make_executor(&ctx, limits));

    let job = wait_terminal(&ctx, id, Duration::from_secs(10)).await;
    assert_eq!(job.state, JobState::Timeout);
    assert_eq!(job.exit_code, Some(124));

    ctx.shutdown.cancel();
    ctx.queue.notify();
    handle.await.unwrap();
}

#[tokio::test]
async fn cancel_mid_run_reaches_cancelled_promptly() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _) = test_ctx(dir.path());
    let id = submit_script(&ctx, 1, b"sleep 30\n");
    let handle = spawn_supervisor(Arc::clone(&ctx), make_executor(&ctx, ExecLimits::default()));

    // Wait for the child to start, then cancel.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while ctx.queue.find(id).unwrap().pid.is_none() {
        assert!(std::time::Instant::now() < deadline, "child never started");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    ctx.queue.cancel(id, false).unwrap();

    let job = wait_terminal(&ctx, id, Duration::from_secs(5)).await;
    assert_eq!(job.state, JobState::Cancelled);
    assert_eq!(job.exit_code, Some(128 + 15));

    ctx.shutdown.cancel();
    ctx.queue.notify();
    handle.await.unwrap();
}

#[tokio::test]
async fn shutdown_stops_the_loop_without_starting_queued_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _) = test_ctx(dir.path());
    let handle = spawn_supervisor(Arc::clone(&ctx), make_executor(&ctx, ExecLimits::default()));

    // Let the supervisor reach its idle wait, then shut down and submit.
    tokio::time::sleep(Duration::from_millis(50)).await;
    ctx.shutdown.cancel();
    ctx.queue.notify();
    handle.await.unwrap();

    let id = submit_script(&ctx, 1, b"echo never\n");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ctx.queue.find(id).unwrap().state, JobState::Queued);
}
