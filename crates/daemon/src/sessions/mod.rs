// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session manager: the TCP accept loop, per-session registry, framed
//! message I/O, idle reaping, and per-type dispatch.
//!
//! One accept-loop task owns the listener; each accepted socket gets its
//! own task that exclusively owns the stream. The registry holds only the
//! session records, so the admin plane can observe and kick sessions
//! without touching their sockets.

mod dispatch;

pub(crate) use dispatch::ConnState;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use mill_core::{Arena, Clock, Handle, ServerStats, Session, SessionId, SessionState};
use mill_wire::{read_frame, write_message, Payload, HEADER_LEN};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::Ctx;

/// Disconnect signals handed to a session's task at admission.
///
/// A graceful kick cancels `kill` only: the task finishes writing any
/// in-flight reply, then exits its loop. A force kick also cancels
/// `force_kill`, which aborts even a write in progress so the socket
/// closes immediately.
#[derive(Clone)]
pub struct SessionSignals {
    pub kill: CancellationToken,
    pub force_kill: CancellationToken,
}

impl SessionSignals {
    fn new() -> Self {
        Self { kill: CancellationToken::new(), force_kill: CancellationToken::new() }
    }
}

struct SessionEntry {
    session: Session,
    signals: SessionSignals,
}

struct RegistryInner {
    arena: Arena<SessionEntry>,
    by_id: HashMap<SessionId, Handle>,
    next_id: u32,
}

/// Exclusive owner of the session record set.
pub struct SessionRegistry<C: Clock> {
    clock: C,
    stats: Arc<ServerStats>,
    inner: Mutex<RegistryInner>,
}

impl<C: Clock> SessionRegistry<C> {
    pub fn new(clock: C, stats: Arc<ServerStats>) -> Self {
        Self {
            clock,
            stats,
            inner: Mutex::new(RegistryInner {
                arena: Arena::new(),
                by_id: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Register an accepted connection. Returns the new id and the
    /// disconnect signals an admin kick fires.
    pub fn admit(&self, remote_addr: SocketAddr) -> (SessionId, SessionSignals) {
        let now_ms = self.clock.epoch_ms();
        let signals = SessionSignals::new();
        let mut inner = self.inner.lock();
        let id = SessionId::from_raw(inner.next_id);
        inner.next_id = inner.next_id.wrapping_add(1);
        let handle = inner.arena.insert(SessionEntry {
            session: Session::new(id, remote_addr, now_ms),
            signals: signals.clone(),
        });
        inner.by_id.insert(id, handle);
        drop(inner);

        self.stats.session_opened();
        info!(session = %id, peer = %remote_addr, "session admitted");
        (id, signals)
    }

    /// Drop a session record. The owning task closes the socket.
    pub fn remove(&self, id: SessionId) -> Option<Session> {
        let mut inner = self.inner.lock();
        let handle = inner.by_id.remove(&id)?;
        let entry = inner.arena.remove(handle)?;
        drop(inner);

        self.stats.session_closed();
        info!(session = %id, "session removed");
        Some(entry.session)
    }

    /// Run a closure against a live session record.
    pub fn with<R>(&self, id: SessionId, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        let &handle = inner.by_id.get(&id)?;
        inner.arena.get_mut(handle).map(|entry| f(&mut entry.session))
    }

    pub fn get(&self, id: SessionId) -> Option<Session> {
        let inner = self.inner.lock();
        let &handle = inner.by_id.get(&id)?;
        inner.arena.get(handle).map(|entry| entry.session.clone())
    }

    pub fn list(&self) -> Vec<Session> {
        self.inner
            .lock()
            .arena
            .iter()
            .map(|(_, entry)| entry.session.clone())
            .collect()
    }

    /// Ask a session's task to stop. Graceful lets an in-flight reply
    /// drain; `force` closes the socket immediately. Returns false for
    /// unknown ids.
    pub fn kick(&self, id: SessionId, force: bool) -> bool {
        let inner = self.inner.lock();
        let Some(&handle) = inner.by_id.get(&id) else { return false };
        match inner.arena.get(handle) {
            Some(entry) => {
                if force {
                    entry.signals.force_kill.cancel();
                }
                entry.signals.kill.cancel();
                true
            }
            None => false,
        }
    }

    /// Job completion callback; drops Processing back to Idle at zero
    /// active jobs.
    pub fn job_finished(&self, id: SessionId) {
        self.with(id, |session| session.job_finished());
    }

    pub fn count(&self) -> usize {
        self.inner.lock().by_id.len()
    }
}

/// Spawn the accept loop.
pub fn spawn_listener<C>(ctx: Arc<Ctx<C>>, listener: TcpListener) -> JoinHandle<()>
where
    C: Clock + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = ctx.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let ctx = Arc::clone(&ctx);
                        tokio::spawn(async move {
                            serve_connection(ctx, stream, addr).await;
                        });
                    }
                    Err(e) => error!(error = %e, "accept failed"),
                },
            }
        }
    })
}

/// Serve one client connection until disconnect, idle timeout, kick, or
/// shutdown.
pub(crate) async fn serve_connection<C: Clock>(
    ctx: Arc<Ctx<C>>,
    stream: tokio::net::TcpStream,
    addr: SocketAddr,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!(peer = %addr, error = %e, "failed to set TCP_NODELAY");
    }

    let (id, signals) = ctx.sessions.admit(addr);
    let (mut reader, mut writer) = stream.into_split();
    let mut conn = ConnState::new(id);

    loop {
        let idle_limit = Duration::from_secs(ctx.tunables.lock().client_timeout_secs);
        let frame = tokio::select! {
            _ = ctx.shutdown.cancelled() => break,
            _ = signals.kill.cancelled() => {
                debug!(session = %id, force = signals.force_kill.is_cancelled(), "session kicked");
                break;
            }
            frame = tokio::time::timeout(idle_limit, read_frame(&mut reader)) => frame,
        };

        let (header, body) = match frame {
            // Idle reap: no notice, the socket just closes.
            Err(_) => {
                info!(session = %id, "idle timeout, reaping session");
                break;
            }
            Ok(Err(e)) => {
                if !matches!(&e, mill_wire::WireError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof)
                {
                    warn!(session = %id, error = %e, "unrecoverable framing error");
                }
                break;
            }
            Ok(Ok(frame)) => frame,
        };

        let frame_bytes = (HEADER_LEN + body.len()) as u64;
        ctx.stats.add_bytes_in(frame_bytes);
        let now_ms = ctx.clock.epoch_ms();
        ctx.sessions.with(id, |session| {
            session.bytes_in += frame_bytes;
            session.touch(now_ms);
        });

        let reply = match Payload::decode(header.msg_type, body) {
            Ok(payload) => dispatch::handle(&ctx, &mut conn, payload),
            // A sound frame with a bad payload earns an Error on the same
            // correlation; the session stays usable.
            Err(e) if e.is_recoverable() => Payload::error(&e.to_fault()),
            Err(e) => {
                warn!(session = %id, error = %e, "undecodable frame");
                break;
            }
        };

        // A graceful kick lets this reply drain; only a force kick
        // abandons it mid-write.
        let written = tokio::select! {
            written = write_message(&mut writer, &reply, header.correlation, ctx.clock.epoch_ms()) => written,
            _ = signals.force_kill.cancelled() => {
                debug!(session = %id, "force disconnect, abandoning reply");
                break;
            }
        };
        match written {
            Ok(written) => {
                ctx.stats.add_bytes_out(written);
                ctx.sessions.with(id, |session| session.bytes_out += written);
            }
            Err(e) => {
                warn!(session = %id, error = %e, "write failed");
                break;
            }
        }
    }

    ctx.sessions.with(id, |session| session.state = SessionState::Disconnecting);
    let cancelled = ctx.queue.cancel_all_for_session(id, false);
    if cancelled > 0 {
        info!(session = %id, cancelled, "cancelled jobs of departing session");
    }
    ctx.sessions.remove(id);
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;
