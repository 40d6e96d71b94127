// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use mill_core::{FakeClock, JobId, SessionId, Tunables};
use parking_lot::Mutex;

use super::*;

#[tokio::test(start_paused = true)]
async fn sweeper_runs_on_interval_and_stops_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let mut tunables = Tunables::default();
    tunables.cleanup_interval_secs = 60;
    let manager = Arc::new(
        FileManager::new(
            dir.path().join("p"),
            dir.path().join("o"),
            Arc::new(Mutex::new(tunables)),
            clock.clone(),
        )
        .unwrap(),
    );

    // One expired temporary: created now, then the fake clock jumps a day.
    let temp = manager.create_temp(JobId::from_raw(1).unwrap(), SessionId::from_raw(1), "tmp");
    std::fs::write(&temp, b"x").unwrap();
    clock.advance(std::time::Duration::from_secs(86_401));

    let shutdown = CancellationToken::new();
    let handle = spawn_sweeper(Arc::clone(&manager), shutdown.clone());

    // Advance paused tokio time past one sweep interval.
    tokio::time::sleep(std::time::Duration::from_secs(61)).await;
    assert!(!temp.exists());
    assert_eq!(manager.tracked_count(), 0);

    shutdown.cancel();
    handle.await.unwrap();
}
