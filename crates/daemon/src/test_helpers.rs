// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for daemon unit tests.
//!
//! The injected registry maps [`Language::Python`] onto `/bin/sh`, so
//! "interpreted" jobs run real child processes on any Unix host.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use mill_core::{Clock as _, Config, FakeClock, Language, ServerStats, Tunables};
use mill_files::FileManager;
use mill_toolchain::{CompilerDescriptor, CompilerRegistry};
use tokio_util::sync::CancellationToken;

use crate::context::Ctx;
use crate::queue::JobQueue;
use crate::sessions::SessionRegistry;

pub(crate) fn sh_descriptor() -> CompilerDescriptor {
    CompilerDescriptor {
        language: Language::Python,
        executable: PathBuf::from("/bin/sh"),
        runtime: None,
        version: "sh".into(),
        default_args: String::new(),
        supports_debug: false,
        supports_optimize: false,
        priority: 7,
    }
}

pub(crate) fn test_ctx(dir: &Path) -> (Arc<Ctx<FakeClock>>, FakeClock) {
    let clock = FakeClock::new();
    let tunables = Arc::new(Mutex::new(Tunables::default()));
    let stats = Arc::new(ServerStats::new(clock.epoch_ms()));
    let files = Arc::new(
        FileManager::new(
            dir.join("processing"),
            dir.join("outgoing"),
            Arc::clone(&tunables),
            clock.clone(),
        )
        .unwrap(),
    );
    let registry = Arc::new(CompilerRegistry::from_descriptors(vec![sh_descriptor()]));
    let sessions = Arc::new(SessionRegistry::new(clock.clone(), Arc::clone(&stats)));
    let queue = Arc::new(JobQueue::new(
        clock.clone(),
        Arc::clone(&stats),
        Arc::clone(&tunables),
    ));

    let ctx = Arc::new(Ctx {
        config: Config::rooted_at(dir),
        tunables,
        clock: clock.clone(),
        stats,
        files,
        registry,
        sessions,
        queue,
        shutdown: CancellationToken::new(),
    });
    (ctx, clock)
}
