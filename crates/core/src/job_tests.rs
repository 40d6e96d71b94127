// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn make_job() -> Job {
    Job::new(
        JobId::from_raw(1).unwrap(),
        SessionId::from_raw(9),
        Language::C,
        JobMode::CompileAndRun,
        5,
        PathBuf::from("/tmp/processing/job_1_main.c"),
        1_000,
    )
}

#[test]
fn zero_job_id_is_invalid() {
    assert_eq!(JobId::from_raw(0), None);
    assert_eq!(JobId::from_raw(42).map(JobId::as_u32), Some(42));
}

#[test]
fn allocator_skips_zero_on_wrap() {
    let mut alloc = JobIdAllocator::default();
    assert_eq!(alloc.next().as_u32(), 1);
    assert_eq!(alloc.next().as_u32(), 2);

    let mut wrapping = JobIdAllocator { next: u32::MAX };
    assert_eq!(wrapping.next().as_u32(), u32::MAX);
    assert_eq!(wrapping.next().as_u32(), 1);
}

#[test]
fn lifecycle_queued_running_completed() {
    let mut job = make_job();
    assert_eq!(job.state, JobState::Queued);
    assert_eq!(job.progress(), 0);

    assert!(job.start(2_000));
    assert_eq!(job.state, JobState::Running);
    assert_eq!(job.started_at_ms, Some(2_000));
    assert_eq!(job.progress(), 50);

    assert!(job.finish(JobState::Completed, 3_500));
    assert_eq!(job.ended_at_ms, Some(3_500));
    assert_eq!(job.wall_time_ms(), Some(1_500));
    assert_eq!(job.progress(), 100);
}

#[test]
fn terminal_states_are_immutable() {
    let mut job = make_job();
    job.start(1_100);
    job.finish(JobState::Timeout, 2_000);

    assert!(!job.finish(JobState::Completed, 3_000));
    assert!(!job.start(3_000));
    assert_eq!(job.state, JobState::Timeout);
    assert_eq!(job.ended_at_ms, Some(2_000));
}

#[test]
fn cancel_only_from_queued() {
    let mut job = make_job();
    assert!(job.cancel_queued(1_200));
    assert_eq!(job.state, JobState::Cancelled);

    let mut running = make_job();
    running.start(1_100);
    assert!(!running.cancel_queued(1_200));
    assert_eq!(running.state, JobState::Running);
}

#[test]
fn finish_clears_pid() {
    let mut job = make_job();
    job.start(1_100);
    job.pid = Some(4242);
    job.finish(JobState::Completed, 2_000);
    assert_eq!(job.pid, None);
}

#[parameterized(
    zero_defaults = { 0, 5 },
    below_min = { 1, 1 },
    in_range = { 7, 7 },
    above_max = { 200, 10 },
)]
fn priority_is_clamped(input: u8, expected: u8) {
    let job = Job::new(
        JobId::from_raw(1).unwrap(),
        SessionId::from_raw(1),
        Language::Python,
        JobMode::InterpretOnly,
        input,
        PathBuf::from("x.py"),
        0,
    );
    assert_eq!(job.priority, expected);
}

#[parameterized(
    queued = { JobState::Queued, false },
    running = { JobState::Running, false },
    completed = { JobState::Completed, true },
    failed = { JobState::Failed, true },
    cancelled = { JobState::Cancelled, true },
    timeout = { JobState::Timeout, true },
)]
fn terminal_classification(state: JobState, terminal: bool) {
    assert_eq!(state.is_terminal(), terminal);
    assert_eq!(JobState::from_code(state.code()), Some(state));
}
