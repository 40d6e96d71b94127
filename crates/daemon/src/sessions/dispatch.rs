// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-type message handling and session-state preconditions.

use std::collections::HashMap;

use mill_core::{Clock, ErrorKind, Fault, JobId, SessionId, SessionState};
use mill_files::validate_filename;
use mill_wire::{
    CompileRequest, CompileResponse, FileUploadChunk, FileUploadStart, Hello, JobStatusPayload,
    NamedFile, Payload,
};
use tracing::debug;

use crate::context::Ctx;
use crate::queue::SubmitRequest;

/// An upload in flight on one connection.
struct PendingUpload {
    filename: String,
    announced: u64,
    received: Vec<u8>,
    next_chunk: u32,
}

/// Connection-local state. Staged uploads live here, not in the registry:
/// they belong to the socket's owning task.
pub(crate) struct ConnState {
    pub id: SessionId,
    pending: Option<PendingUpload>,
    uploads: HashMap<String, Vec<u8>>,
}

impl ConnState {
    pub fn new(id: SessionId) -> Self {
        Self { id, pending: None, uploads: HashMap::new() }
    }
}

/// Handle one decoded request and produce the reply payload. Precondition
/// failures become `Error` replies; the caller echoes the correlation id.
pub(crate) fn handle<C: Clock>(ctx: &Ctx<C>, conn: &mut ConnState, payload: Payload) -> Payload {
    let result = match payload {
        Payload::Hello(hello) => handle_hello(ctx, conn, hello),
        Payload::FileUploadStart(start) => handle_upload_start(ctx, conn, start),
        Payload::FileUploadChunk(chunk) => handle_upload_chunk(ctx, conn, chunk),
        Payload::FileUploadEnd(end) => handle_upload_end(ctx, conn, end),
        Payload::CompileRequest(request) => handle_compile(ctx, conn, request),
        Payload::StatusRequest { job_id } => handle_status(ctx, conn, job_id),
        Payload::ResultRequest { job_id } => handle_result(ctx, conn, job_id),
        Payload::Ping => Ok(Payload::Pong),
        other => Err(Fault::invalid(
            format!("unexpected message type {:?} on a client session", other.message_type()),
            "dispatch",
        )),
    };
    result.unwrap_or_else(|fault| Payload::error(&fault))
}

fn state_of<C: Clock>(ctx: &Ctx<C>, conn: &ConnState) -> Result<SessionState, Fault> {
    ctx.sessions
        .with(conn.id, |session| session.state)
        .ok_or_else(|| Fault::internal("session record vanished", "dispatch"))
}

fn handle_hello<C: Clock>(
    ctx: &Ctx<C>,
    conn: &mut ConnState,
    hello: Hello,
) -> Result<Payload, Fault> {
    if state_of(ctx, conn)? != SessionState::Connecting {
        return Err(Fault::permission("Hello is only valid on a new connection", "hello"));
    }
    ctx.sessions.with(conn.id, |session| {
        session.client_name = hello.name;
        session.client_platform = hello.platform;
        session.state = SessionState::Authenticated;
    });
    debug!(session = %conn.id, "session authenticated");
    Ok(Payload::HelloOk(Hello {
        name: "milld".to_string(),
        platform: std::env::consts::OS.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

fn handle_upload_start<C: Clock>(
    ctx: &Ctx<C>,
    conn: &mut ConnState,
    start: FileUploadStart,
) -> Result<Payload, Fault> {
    if !state_of(ctx, conn)?.accepts_work() {
        return Err(Fault::permission("upload not allowed in this state", "upload_start"));
    }
    validate_filename(&start.filename).map_err(|e| e.to_fault())?;

    let limit = ctx.tunables.lock().max_file_size_bytes;
    if start.total_size > limit {
        return Err(Fault::new(
            ErrorKind::QuotaExceeded,
            format!("{} bytes exceeds the {limit} byte upload cap", start.total_size),
            "upload_start",
        ));
    }

    conn.pending = Some(PendingUpload {
        filename: start.filename,
        announced: start.total_size,
        received: Vec::with_capacity(start.total_size.min(64 * 1024) as usize),
        next_chunk: 0,
    });
    ctx.sessions.with(conn.id, |session| session.state = SessionState::Uploading);
    Ok(Payload::Ack)
}

fn handle_upload_chunk<C: Clock>(
    ctx: &Ctx<C>,
    conn: &mut ConnState,
    chunk: FileUploadChunk,
) -> Result<Payload, Fault> {
    if state_of(ctx, conn)? != SessionState::Uploading {
        return Err(Fault::permission("no upload in progress", "upload_chunk"));
    }
    let pending = conn
        .pending
        .as_mut()
        .ok_or_else(|| Fault::permission("no upload in progress", "upload_chunk"))?;

    if chunk.chunk_index != pending.next_chunk {
        return Err(Fault::invalid(
            format!("expected chunk {}, got {}", pending.next_chunk, chunk.chunk_index),
            "upload_chunk",
        ));
    }
    if pending.received.len() as u64 + chunk.data.len() as u64 > pending.announced {
        return Err(Fault::new(
            ErrorKind::QuotaExceeded,
            "chunk overruns the announced upload size",
            "upload_chunk",
        ));
    }

    pending.received.extend_from_slice(&chunk.data);
    pending.next_chunk += 1;
    Ok(Payload::Ack)
}

fn handle_upload_end<C: Clock>(
    ctx: &Ctx<C>,
    conn: &mut ConnState,
    end: NamedFile,
) -> Result<Payload, Fault> {
    if state_of(ctx, conn)? != SessionState::Uploading {
        return Err(Fault::permission("no upload in progress", "upload_end"));
    }
    // Whatever happens next, the upload phase is over.
    ctx.sessions.with(conn.id, |session| session.state = SessionState::Idle);

    let pending = conn
        .pending
        .take()
        .ok_or_else(|| Fault::permission("no upload in progress", "upload_end"))?;

    if pending.filename != end.filename {
        return Err(Fault::invalid(
            format!("upload end names {:?}, started {:?}", end.filename, pending.filename),
            "upload_end",
        ));
    }
    if pending.received.len() as u64 != pending.announced {
        return Err(Fault::invalid(
            format!(
                "received {} bytes of an announced {}",
                pending.received.len(),
                pending.announced
            ),
            "upload_end",
        ));
    }

    debug!(session = %conn.id, file = %pending.filename, size = pending.received.len(), "upload staged");
    conn.uploads.insert(pending.filename, pending.received);
    Ok(Payload::Ack)
}

fn handle_compile<C: Clock>(
    ctx: &Ctx<C>,
    conn: &mut ConnState,
    request: CompileRequest,
) -> Result<Payload, Fault> {
    if !state_of(ctx, conn)?.accepts_work() {
        return Err(Fault::permission("session is busy", "compile"));
    }

    let max_active = ctx.tunables.lock().max_active_jobs_per_session;
    let active = ctx
        .sessions
        .with(conn.id, |session| session.active_jobs)
        .unwrap_or(0);
    if u64::from(active) >= max_active {
        return Err(Fault::new(
            ErrorKind::QuotaExceeded,
            format!("session already has {active} active jobs"),
            "compile",
        ));
    }

    if ctx.registry.resolve(request.language).is_none() {
        return Err(Fault::new(
            ErrorKind::UnsupportedLanguage,
            format!("no toolchain detected for {}", request.language),
            "compile",
        ));
    }

    let bytes = conn.uploads.get(&request.filename).ok_or_else(|| {
        Fault::not_found(format!("no uploaded file named {:?}", request.filename), "compile")
    })?;

    let session_id = conn.id;
    let files = &ctx.files;
    let filename = request.filename.clone();
    let job_id = ctx.queue.submit(
        session_id,
        SubmitRequest {
            language: request.language,
            mode: request.mode,
            priority: request.priority,
            compiler_args: request.compiler_args,
            execution_args: request.execution_args,
        },
        |job_id| {
            files
                .save_uploaded(job_id, session_id, &filename, bytes)
                .map_err(|e| e.to_fault())
        },
    )?;

    // The staged bytes now live under the job's storage name.
    conn.uploads.remove(&request.filename);
    ctx.sessions.with(conn.id, |session| {
        session.active_jobs += 1;
        session.state = SessionState::Processing;
    });
    Ok(Payload::CompileResponse(CompileResponse::queued(job_id.as_u32())))
}

/// Shared job lookup with the ownership boundary check.
fn owned_job<C: Clock>(ctx: &Ctx<C>, conn: &ConnState, raw_id: u32) -> Result<mill_core::Job, Fault> {
    let id = JobId::from_raw(raw_id)
        .ok_or_else(|| Fault::invalid("job id 0 is invalid", "job_lookup"))?;
    let job = ctx
        .queue
        .find(id)
        .ok_or_else(|| Fault::not_found(format!("no job {id}"), "job_lookup"))?;
    if job.owner != conn.id {
        return Err(Fault::permission(
            format!("job {id} belongs to another session"),
            "job_lookup",
        ));
    }
    Ok(job)
}

fn handle_status<C: Clock>(
    ctx: &Ctx<C>,
    conn: &ConnState,
    raw_id: u32,
) -> Result<Payload, Fault> {
    let job = owned_job(ctx, conn, raw_id)?;
    Ok(Payload::JobStatus(JobStatusPayload {
        job_id: job.id.as_u32(),
        state: job.state,
        progress: job.progress(),
        pid: job.pid.unwrap_or(0),
        queue_position: ctx.queue.queue_position(job.id),
        estimated_wait_ms: ctx.queue.estimated_wait_ms(job.id),
    }))
}

fn handle_result<C: Clock>(
    ctx: &Ctx<C>,
    conn: &ConnState,
    raw_id: u32,
) -> Result<Payload, Fault> {
    let job = owned_job(ctx, conn, raw_id)?;
    if !job.is_terminal() {
        return Err(Fault::invalid(
            format!("job {} is still {}", job.id, job.state),
            "result",
        ));
    }

    let stdout = job
        .output_file
        .as_deref()
        .and_then(|name| ctx.files.load(name).ok())
        .unwrap_or_default();
    let stderr = job
        .error_file
        .as_deref()
        .and_then(|name| ctx.files.load(name).ok())
        .unwrap_or_default();

    Ok(Payload::CompileResponse(CompileResponse {
        job_id: job.id.as_u32(),
        status: job.state,
        exit_code: job.exit_code.unwrap_or(-1),
        time_ms: job.wall_time_ms().unwrap_or(0),
        stdout,
        stderr,
    }))
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
