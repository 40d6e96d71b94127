// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admin control plane.
//!
//! A local-only Unix socket (0600) carrying the same framing as the client
//! transport. At most one admin session is served at a time, and every
//! command before `AdminConnect` is refused with a Permission error.

mod commands;
mod render;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mill_core::{Clock, Fault};
use mill_wire::{read_frame, write_message, Payload};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::context::Ctx;
use commands::AdminAction;

/// Spawn the admin accept loop over an already-bound listener.
pub fn spawn_admin<C>(ctx: Arc<Ctx<C>>, listener: UnixListener) -> JoinHandle<()>
where
    C: Clock + 'static,
{
    let active = Arc::new(AtomicBool::new(false));
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = ctx.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        if active.swap(true, Ordering::SeqCst) {
                            refuse_second_admin(&ctx, stream).await;
                            continue;
                        }
                        let ctx = Arc::clone(&ctx);
                        let active = Arc::clone(&active);
                        tokio::spawn(async move {
                            serve_admin(&ctx, stream).await;
                            active.store(false, Ordering::SeqCst);
                        });
                    }
                    Err(e) => warn!(error = %e, "admin accept failed"),
                },
            }
        }
    })
}

/// Only one admin at a time; a second connection gets a Permission error
/// and the socket closed.
async fn refuse_second_admin<C: Clock>(ctx: &Ctx<C>, stream: UnixStream) {
    let (_, mut writer) = stream.into_split();
    let fault = Fault::permission("an admin session is already active", "admin_connect");
    let _ = write_message(&mut writer, &Payload::error(&fault), 0, ctx.clock.epoch_ms()).await;
}

async fn serve_admin<C: Clock>(ctx: &Ctx<C>, stream: UnixStream) {
    info!("admin session opened");
    let (mut reader, mut writer) = stream.into_split();
    let mut authenticated = false;
    let mut commands_handled = 0u32;

    loop {
        let idle_limit = Duration::from_secs(ctx.tunables.lock().admin_timeout_secs);
        let frame = tokio::select! {
            _ = ctx.shutdown.cancelled() => break,
            frame = tokio::time::timeout(idle_limit, read_frame(&mut reader)) => frame,
        };

        let (header, body) = match frame {
            Err(_) => {
                info!("admin session idle timeout");
                break;
            }
            Ok(Err(e)) => {
                if !matches!(&e, mill_wire::WireError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof)
                {
                    warn!(error = %e, "admin framing error");
                }
                break;
            }
            Ok(Ok(frame)) => frame,
        };

        let action = match Payload::decode(header.msg_type, body) {
            Err(e) if e.is_recoverable() => AdminAction::Reply(Payload::error(&e.to_fault())),
            Err(e) => {
                warn!(error = %e, "undecodable admin frame");
                break;
            }
            // The handshake gate: nothing but AdminConnect may have an
            // effect before it.
            Ok(Payload::AdminConnect) => {
                authenticated = true;
                AdminAction::Reply(Payload::Ack)
            }
            Ok(_) if !authenticated => AdminAction::Reply(Payload::error(&Fault::permission(
                "AdminConnect required first",
                "admin_gate",
            ))),
            Ok(payload) => {
                ctx.stats.admin_command();
                commands_handled += 1;
                commands::dispatch(ctx, payload)
            }
        };

        match action {
            AdminAction::Reply(reply) => {
                if write_message(&mut writer, &reply, header.correlation, ctx.clock.epoch_ms())
                    .await
                    .is_err()
                {
                    break;
                }
            }
            AdminAction::ReplyThenShutdown { reply, graceful, delay } => {
                // Ack first so the admin sees the acceptance, then act.
                let _ =
                    write_message(&mut writer, &reply, header.correlation, ctx.clock.epoch_ms())
                        .await;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if graceful {
                    info!("admin requested graceful shutdown");
                    ctx.shutdown.cancel();
                    ctx.queue.notify();
                } else {
                    info!("admin requested immediate shutdown");
                    std::process::exit(0);
                }
                break;
            }
        }
    }

    info!(commands = commands_handled, "admin session closed");
}

#[cfg(test)]
#[path = "admin_tests.rs"]
mod tests;
