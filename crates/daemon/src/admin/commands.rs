// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admin command dispatch.

use std::time::Duration;

use mill_core::{Clock, ConfigKey, ErrorKind, Fault, JobId, JobState, SessionId};
use mill_wire::{BulkDisconnect, BulkDisconnectMode, JobFilter, Payload};
use tracing::info;

use crate::context::Ctx;

use super::render;

/// What the admin loop should do after a command.
pub(crate) enum AdminAction {
    Reply(Payload),
    ReplyThenShutdown { reply: Payload, graceful: bool, delay: Duration },
}

pub(crate) fn dispatch<C: Clock>(ctx: &Ctx<C>, payload: Payload) -> AdminAction {
    let reply = match payload {
        Payload::AdminConnect => Ok(Payload::Ack),
        Payload::ListClients(req) => Ok(list_clients(ctx, req.detailed, &req.filter)),
        Payload::ListJobs(req) => Ok(list_jobs(ctx, req.filter, req.session_id)),
        Payload::ServerStats(req) => Ok(server_stats(ctx, req.json)),
        Payload::DisconnectClient(req) => disconnect_client(ctx, req.session_id, req.force),
        Payload::KillJob(req) => kill_job(ctx, req.job_id, req.force),
        Payload::ServerShutdown(req) => {
            return AdminAction::ReplyThenShutdown {
                reply: Payload::Ack,
                graceful: req.graceful,
                delay: Duration::from_secs(u64::from(req.delay_seconds)),
            };
        }
        Payload::ConfigGet { key } => config_get(ctx, &key),
        Payload::ConfigSet(req) => config_set(ctx, &req.key, &req.value),
        Payload::ConfigList => Ok(Payload::AdminText(render::config_table(
            &ctx.tunables.lock(),
        ))),
        Payload::BulkDisconnect(req) => Ok(bulk_disconnect(ctx, req)),
        Payload::ReorderQueue => {
            ctx.queue.reorder_by_priority();
            ctx.queue.notify();
            info!("admin reordered the queue by priority");
            Ok(Payload::Ack)
        }
        other => Err(Fault::invalid(
            format!("unexpected message type {:?} on the admin channel", other.message_type()),
            "admin",
        )),
    };
    AdminAction::Reply(reply.unwrap_or_else(|fault| Payload::error(&fault)))
}

fn list_clients<C: Clock>(ctx: &Ctx<C>, detailed: bool, filter: &str) -> Payload {
    let now_ms = ctx.clock.epoch_ms();
    let mut sessions = ctx.sessions.list();
    if !filter.is_empty() {
        sessions.retain(|s| {
            s.remote_addr.to_string().contains(filter) || s.client_name.contains(filter)
        });
    }
    Payload::AdminText(render::clients_table(&sessions, detailed, now_ms))
}

fn list_jobs<C: Clock>(ctx: &Ctx<C>, filter: JobFilter, session_id: u32) -> Payload {
    let mut jobs = ctx.queue.list_all();
    match filter {
        JobFilter::Active => jobs.retain(|j| !j.is_terminal()),
        JobFilter::All => {}
        JobFilter::Completed => jobs.retain(|j| j.state == JobState::Completed),
        JobFilter::ForClient => {
            jobs.retain(|j| j.owner == SessionId::from_raw(session_id));
        }
    }
    Payload::AdminText(render::jobs_table(&jobs))
}

fn server_stats<C: Clock>(ctx: &Ctx<C>, as_json: bool) -> Payload {
    let snapshot = ctx
        .stats
        .snapshot(ctx.clock.epoch_ms(), ctx.files.tracked_count());
    if as_json {
        match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => Payload::AdminText(json),
            Err(e) => Payload::error(&Fault::internal(e.to_string(), "stats_json")),
        }
    } else {
        Payload::Stats(snapshot)
    }
}

fn disconnect_client<C: Clock>(
    ctx: &Ctx<C>,
    session_id: u32,
    force: bool,
) -> Result<Payload, Fault> {
    let id = SessionId::from_raw(session_id);
    if !ctx.sessions.kick(id, force) {
        return Err(Fault::not_found(format!("no session {id}"), "disconnect"));
    }
    info!(session = %id, force, "admin disconnected client");
    Ok(Payload::Ack)
}

fn kill_job<C: Clock>(ctx: &Ctx<C>, job_id: u32, force: bool) -> Result<Payload, Fault> {
    let id = JobId::from_raw(job_id)
        .ok_or_else(|| Fault::invalid("job id 0 is invalid", "kill_job"))?;
    ctx.queue.cancel(id, force)?;
    ctx.queue.notify();
    info!(job = %id, force, "admin killed job");
    Ok(Payload::Ack)
}

fn config_get<C: Clock>(ctx: &Ctx<C>, key: &str) -> Result<Payload, Fault> {
    let key = ConfigKey::from_name(key)
        .ok_or_else(|| Fault::invalid(format!("unknown config key {key:?}"), "config_get"))?;
    let value = ctx.tunables.lock().get(key);
    Ok(Payload::AdminText(format!("{key} = {value}\n")))
}

fn config_set<C: Clock>(ctx: &Ctx<C>, key: &str, value: &str) -> Result<Payload, Fault> {
    let key = ConfigKey::from_name(key)
        .ok_or_else(|| Fault::invalid(format!("unknown config key {key:?}"), "config_set"))?;
    let value: u64 = value.trim().parse().map_err(|_| {
        Fault::new(
            ErrorKind::InvalidArgument,
            format!("{key} expects an unsigned integer, got {value:?}"),
            "config_set",
        )
    })?;
    ctx.tunables.lock().set(key, value)?;
    info!(%key, value, "admin updated config");
    Ok(Payload::Ack)
}

fn bulk_disconnect<C: Clock>(ctx: &Ctx<C>, req: BulkDisconnect) -> Payload {
    let now_ms = ctx.clock.epoch_ms();
    let victims: Vec<SessionId> = ctx
        .sessions
        .list()
        .into_iter()
        .filter(|s| match req.mode {
            BulkDisconnectMode::IdleLongerThan => {
                s.idle_for_ms(now_ms) > u64::from(req.idle_secs) * 1_000
            }
            BulkDisconnectMode::IpMatching => {
                s.remote_addr.ip().to_string().starts_with(&req.pattern)
            }
            BulkDisconnectMode::AllExcept => s.id != SessionId::from_raw(req.except_session),
        })
        .map(|s| s.id)
        .collect();

    let mut kicked = 0;
    for id in victims {
        if ctx.sessions.kick(id, false) {
            kicked += 1;
        }
    }
    info!(kicked, "admin bulk disconnect");
    Payload::AdminText(format!("disconnected {kicked} client(s)\n"))
}
