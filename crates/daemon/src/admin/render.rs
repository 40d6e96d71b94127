// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Text tables for the admin channel.

use std::fmt::Write;

use mill_core::{Job, Session, Tunables};

pub(crate) fn clients_table(sessions: &[Session], detailed: bool, now_ms: u64) -> String {
    let mut out = String::new();
    if detailed {
        let _ = writeln!(
            out,
            "{:<6} {:<22} {:<14} {:<16} {:>6} {:>10} {:>12} {:>12}",
            "id", "peer", "state", "name", "jobs", "idle_s", "bytes_in", "bytes_out"
        );
        for s in sessions {
            let _ = writeln!(
                out,
                "{:<6} {:<22} {:<14} {:<16} {:>6} {:>10} {:>12} {:>12}",
                s.id.to_string(),
                s.remote_addr.to_string(),
                s.state.to_string(),
                truncate(&s.client_name, 16),
                s.active_jobs,
                s.idle_for_ms(now_ms) / 1_000,
                s.bytes_in,
                s.bytes_out,
            );
        }
    } else {
        let _ = writeln!(out, "{:<6} {:<22} {:<14} {:>6}", "id", "peer", "state", "jobs");
        for s in sessions {
            let _ = writeln!(
                out,
                "{:<6} {:<22} {:<14} {:>6}",
                s.id.to_string(),
                s.remote_addr.to_string(),
                s.state.to_string(),
                s.active_jobs,
            );
        }
    }
    let _ = writeln!(out, "{} session(s)", sessions.len());
    out
}

pub(crate) fn jobs_table(jobs: &[Job]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<8} {:<8} {:<12} {:<12} {:<10} {:>4} {:>6} {:>8}",
        "id", "owner", "language", "mode", "state", "pri", "pid", "exit"
    );
    for j in jobs {
        let _ = writeln!(
            out,
            "{:<8} {:<8} {:<12} {:<12} {:<10} {:>4} {:>6} {:>8}",
            j.id.to_string(),
            j.owner.to_string(),
            j.language.to_string(),
            j.mode.to_string(),
            j.state.to_string(),
            j.priority,
            j.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
            j.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
        );
    }
    let _ = writeln!(out, "{} job(s)", jobs.len());
    out
}

pub(crate) fn config_table(tunables: &Tunables) -> String {
    let mut out = String::new();
    for key in mill_core::ConfigKey::ALL {
        let _ = writeln!(out, "{key} = {}", tunables.get(key));
    }
    out
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
