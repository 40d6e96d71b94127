// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared daemon context threaded into every worker task.
//!
//! There are no process globals; everything a handler can observe or
//! mutate hangs off this value. Lock order when more than one is taken:
//! sessions → queue → files → stats.

use std::sync::Arc;

use parking_lot::Mutex;
use mill_core::{Clock, Config, ServerStats, Tunables};
use mill_files::FileManager;
use mill_toolchain::CompilerRegistry;
use tokio_util::sync::CancellationToken;

use crate::queue::JobQueue;
use crate::sessions::SessionRegistry;

pub struct Ctx<C: Clock> {
    pub config: Config,
    pub tunables: Arc<Mutex<Tunables>>,
    pub clock: C,
    pub stats: Arc<ServerStats>,
    pub files: Arc<FileManager<C>>,
    pub registry: Arc<CompilerRegistry>,
    pub sessions: Arc<SessionRegistry<C>>,
    pub queue: Arc<JobQueue<C>>,
    /// Global shutdown event; every worker loop observes it.
    pub shutdown: CancellationToken,
}
