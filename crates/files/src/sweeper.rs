// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic temp-file sweeper.

use std::sync::Arc;
use std::time::Duration;

use mill_core::Clock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::manager::FileManager;

/// Spawn the background sweeper. Re-reads `cleanup_interval_secs` each
/// round so admin config changes take effect without a restart.
pub fn spawn_sweeper<C>(
    manager: Arc<FileManager<C>>,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    C: Clock + 'static,
{
    tokio::spawn(async move {
        loop {
            let interval = Duration::from_secs(manager.cleanup_interval_secs());
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    let swept = manager.sweep_expired();
                    if swept > 0 {
                        info!(swept, "swept expired temporary files");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;
