// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `milld` — the mill compilation service daemon.

use std::path::PathBuf;

use mill_core::Config;
use mill_daemon::{lifecycle, DaemonDeps};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let state_dir = std::env::var_os("MILLD_STATE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/var/lib/mill"));
    let mut config = Config::rooted_at(state_dir);
    if let Some(port) = std::env::var("MILLD_PORT").ok().and_then(|p| p.parse().ok()) {
        config.listen_addr.set_port(port);
    }

    let deps = match DaemonDeps::probe().await {
        Ok(deps) => deps,
        Err(e) => {
            error!(error = %e, "initialisation failed");
            std::process::exit(1);
        }
    };

    match lifecycle::start(config, deps).await {
        Ok(daemon) => {
            info!(addr = %daemon.local_addr(), "READY");
            daemon.wait().await;
        }
        Err(e) => {
            error!(error = %e, "initialisation failed");
            std::process::exit(1);
        }
    }
}
