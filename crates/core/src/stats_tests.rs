// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn session_counters() {
    let stats = ServerStats::new(1_000);
    stats.session_opened();
    stats.session_opened();
    stats.session_closed();

    let snap = stats.snapshot(5_000, 0);
    assert_eq!(snap.total_sessions, 2);
    assert_eq!(snap.active_sessions, 1);
    assert_eq!(snap.uptime_ms, 4_000);

    // Does not underflow.
    stats.session_closed();
    stats.session_closed();
    assert_eq!(stats.snapshot(5_000, 0).active_sessions, 0);
}

#[test]
fn job_terminal_states_bucketed() {
    let stats = ServerStats::new(0);
    for _ in 0..4 {
        stats.job_submitted();
    }
    stats.job_finished(JobState::Completed, Some(100));
    stats.job_finished(JobState::Failed, Some(200));
    stats.job_finished(JobState::Cancelled, None);
    stats.job_finished(JobState::Timeout, Some(60_000));

    let snap = stats.snapshot(0, 0);
    assert_eq!(snap.total_jobs, 4);
    assert_eq!(snap.active_jobs, 0);
    assert_eq!(snap.completed_jobs, 1);
    assert_eq!(snap.failed_jobs, 1);
    assert_eq!(snap.cancelled_jobs, 1);
    assert_eq!(snap.timeout_jobs, 1);
}

#[test]
fn ema_seeds_then_smooths() {
    let stats = ServerStats::new(0);
    stats.job_submitted();
    stats.job_finished(JobState::Completed, Some(1_000));
    assert_eq!(stats.mean_job_wall_ms(), 1_000);

    stats.job_submitted();
    stats.job_finished(JobState::Completed, Some(2_000));
    // 1000 + 0.2 * (2000 - 1000)
    assert_eq!(stats.mean_job_wall_ms(), 1_200);
}

#[test]
fn toolchain_counters_and_emas() {
    let stats = ServerStats::new(0);
    stats.compilation_finished(true, 500);
    stats.compilation_finished(false, 300);
    stats.execution_finished(true, 40);

    let snap = stats.snapshot(0, 3);
    assert_eq!(snap.successful_compilations, 1);
    assert_eq!(snap.failed_compilations, 1);
    assert_eq!(snap.successful_executions, 1);
    assert_eq!(snap.failed_executions, 0);
    assert_eq!(snap.avg_compile_ms, 460); // 500 + 0.2 * (300 - 500)
    assert_eq!(snap.avg_exec_ms, 40);
    assert_eq!(snap.files_tracked, 3);
}

#[test]
fn byte_counters_accumulate() {
    let stats = ServerStats::new(0);
    stats.add_bytes_in(100);
    stats.add_bytes_in(28);
    stats.add_bytes_out(64);
    stats.admin_command();

    let snap = stats.snapshot(0, 0);
    assert_eq!(snap.bytes_in, 128);
    assert_eq!(snap.bytes_out, 64);
    assert_eq!(snap.admin_commands, 1);
}

#[test]
fn snapshot_serializes_to_json() {
    let stats = ServerStats::new(1_234);
    let snap = stats.snapshot(2_234, 1);
    let json = serde_json::to_string(&snap).unwrap();
    assert!(json.contains("\"uptime_ms\":1000"));
    let back: ServerStatsSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back, snap);
}
