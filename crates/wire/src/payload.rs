// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed payloads and their binary schemas.
//!
//! Each message type carries one fixed schema. Integers are big-endian;
//! strings use the fixed-width NUL-padded fields from [`crate::field`].
//! Variable-length tails (upload chunks, captured output, admin text) are
//! length-prefixed or run to the end of the frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use mill_core::{ErrorKind, Fault, JobMode, JobState, Language, ServerStatsSnapshot};

use crate::error::WireError;
use crate::field::{get_fixed_str, put_fixed_str, width};
use crate::types::MessageType;

/// Client/server identity exchanged in the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub name: String,
    pub platform: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUploadStart {
    pub filename: String,
    pub total_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUploadChunk {
    pub chunk_index: u32,
    pub data: Vec<u8>,
}

/// A payload that names one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedFile {
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    pub language: Language,
    pub mode: JobMode,
    pub priority: u8,
    pub filename: String,
    pub compiler_args: String,
    pub execution_args: String,
}

/// Submission ack and final result share this shape; on the ack the result
/// fields are zero and the output buffers empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileResponse {
    pub job_id: u32,
    pub status: JobState,
    pub exit_code: i32,
    pub time_ms: u64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CompileResponse {
    /// Ack for a freshly queued job.
    pub fn queued(job_id: u32) -> Self {
        Self {
            job_id,
            status: JobState::Queued,
            exit_code: 0,
            time_ms: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatusPayload {
    pub job_id: u32,
    pub state: JobState,
    pub progress: u8,
    pub pid: u32,
    pub queue_position: u32,
    pub estimated_wait_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    pub context: String,
}

impl From<&Fault> for ErrorPayload {
    fn from(fault: &Fault) -> Self {
        Self {
            kind: fault.kind,
            message: fault.message.clone(),
            context: fault.context.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListClients {
    pub detailed: bool,
    pub filter: String,
}

/// Which jobs `ListJobs` should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFilter {
    Active,
    All,
    Completed,
    ForClient,
}

impl JobFilter {
    fn code(self) -> u8 {
        match self {
            JobFilter::Active => 0,
            JobFilter::All => 1,
            JobFilter::Completed => 2,
            JobFilter::ForClient => 3,
        }
    }

    fn from_code(code: u8) -> Result<Self, WireError> {
        Ok(match code {
            0 => JobFilter::Active,
            1 => JobFilter::All,
            2 => JobFilter::Completed,
            3 => JobFilter::ForClient,
            other => {
                return Err(WireError::Malformed(format!("unknown job filter {other}")))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListJobs {
    pub filter: JobFilter,
    /// Only meaningful with [`JobFilter::ForClient`].
    pub session_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsRequest {
    pub detailed: bool,
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectClient {
    pub session_id: u32,
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillJob {
    pub job_id: u32,
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerShutdown {
    pub graceful: bool,
    pub delay_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSetPayload {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkDisconnectMode {
    IdleLongerThan,
    IpMatching,
    AllExcept,
}

impl BulkDisconnectMode {
    fn code(self) -> u8 {
        match self {
            BulkDisconnectMode::IdleLongerThan => 0,
            BulkDisconnectMode::IpMatching => 1,
            BulkDisconnectMode::AllExcept => 2,
        }
    }

    fn from_code(code: u8) -> Result<Self, WireError> {
        Ok(match code {
            0 => BulkDisconnectMode::IdleLongerThan,
            1 => BulkDisconnectMode::IpMatching,
            2 => BulkDisconnectMode::AllExcept,
            other => {
                return Err(WireError::Malformed(format!("unknown disconnect mode {other}")))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkDisconnect {
    pub mode: BulkDisconnectMode,
    pub idle_secs: u32,
    pub pattern: String,
    pub except_session: u32,
}

/// A decoded message payload, one variant per [`MessageType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Hello(Hello),
    FileUploadStart(FileUploadStart),
    FileUploadChunk(FileUploadChunk),
    FileUploadEnd(NamedFile),
    CompileRequest(CompileRequest),
    StatusRequest { job_id: u32 },
    ResultRequest { job_id: u32 },
    Ping,
    HelloOk(Hello),
    Ack,
    Error(ErrorPayload),
    CompileResponse(CompileResponse),
    JobStatus(JobStatusPayload),
    Pong,
    Stats(ServerStatsSnapshot),
    AdminText(String),
    AdminConnect,
    ListClients(ListClients),
    ListJobs(ListJobs),
    ServerStats(StatsRequest),
    DisconnectClient(DisconnectClient),
    KillJob(KillJob),
    ServerShutdown(ServerShutdown),
    ConfigGet { key: String },
    ConfigSet(ConfigSetPayload),
    ConfigList,
    BulkDisconnect(BulkDisconnect),
    ReorderQueue,
}

impl Payload {
    /// The message type this payload travels under.
    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::Hello(_) => MessageType::Hello,
            Payload::FileUploadStart(_) => MessageType::FileUploadStart,
            Payload::FileUploadChunk(_) => MessageType::FileUploadChunk,
            Payload::FileUploadEnd(_) => MessageType::FileUploadEnd,
            Payload::CompileRequest(_) => MessageType::CompileRequest,
            Payload::StatusRequest { .. } => MessageType::StatusRequest,
            Payload::ResultRequest { .. } => MessageType::ResultRequest,
            Payload::Ping => MessageType::Ping,
            Payload::HelloOk(_) => MessageType::HelloOk,
            Payload::Ack => MessageType::Ack,
            Payload::Error(_) => MessageType::Error,
            Payload::CompileResponse(_) => MessageType::CompileResponse,
            Payload::JobStatus(_) => MessageType::JobStatus,
            Payload::Pong => MessageType::Pong,
            Payload::Stats(_) => MessageType::StatsPayload,
            Payload::AdminText(_) => MessageType::AdminText,
            Payload::AdminConnect => MessageType::AdminConnect,
            Payload::ListClients(_) => MessageType::ListClients,
            Payload::ListJobs(_) => MessageType::ListJobs,
            Payload::ServerStats(_) => MessageType::ServerStats,
            Payload::DisconnectClient(_) => MessageType::DisconnectClient,
            Payload::KillJob(_) => MessageType::KillJob,
            Payload::ServerShutdown(_) => MessageType::ServerShutdown,
            Payload::ConfigGet { .. } => MessageType::ConfigGet,
            Payload::ConfigSet(_) => MessageType::ConfigSet,
            Payload::ConfigList => MessageType::ConfigList,
            Payload::BulkDisconnect(_) => MessageType::BulkDisconnect,
            Payload::ReorderQueue => MessageType::ReorderQueue,
        }
    }

    /// Build an `Error` payload from a fault.
    pub fn error(fault: &Fault) -> Self {
        Payload::Error(ErrorPayload::from(fault))
    }

    /// Serialize to payload bytes (header excluded).
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Payload::Hello(h) | Payload::HelloOk(h) => {
                put_fixed_str(&mut buf, &h.name, width::NAME);
                put_fixed_str(&mut buf, &h.platform, width::PLATFORM);
                put_fixed_str(&mut buf, &h.version, width::VERSION);
            }
            Payload::FileUploadStart(p) => {
                put_fixed_str(&mut buf, &p.filename, width::FILENAME);
                buf.put_u64(p.total_size);
            }
            Payload::FileUploadChunk(p) => {
                buf.put_u32(p.chunk_index);
                buf.put_u32(p.data.len() as u32);
                buf.put_slice(&p.data);
            }
            Payload::FileUploadEnd(p) => {
                put_fixed_str(&mut buf, &p.filename, width::FILENAME);
            }
            Payload::CompileRequest(p) => {
                buf.put_u8(p.language.code());
                buf.put_u8(p.mode.code());
                buf.put_u8(p.priority);
                buf.put_u8(0); // reserved
                put_fixed_str(&mut buf, &p.filename, width::FILENAME);
                put_fixed_str(&mut buf, &p.compiler_args, width::ARGS);
                put_fixed_str(&mut buf, &p.execution_args, width::ARGS);
            }
            Payload::StatusRequest { job_id } | Payload::ResultRequest { job_id } => {
                buf.put_u32(*job_id);
            }
            Payload::Ping
            | Payload::Pong
            | Payload::Ack
            | Payload::AdminConnect
            | Payload::ConfigList
            | Payload::ReorderQueue => {}
            Payload::Error(p) => {
                buf.put_u16(p.kind.code());
                put_fixed_str(&mut buf, &p.message, width::ERROR_MESSAGE);
                put_fixed_str(&mut buf, &p.context, width::ERROR_CONTEXT);
            }
            Payload::CompileResponse(p) => {
                buf.put_u32(p.job_id);
                buf.put_u8(p.status.code());
                buf.put_i32(p.exit_code);
                buf.put_u32(p.stdout.len() as u32);
                buf.put_u32(p.stderr.len() as u32);
                buf.put_u64(p.time_ms);
                buf.put_slice(&p.stdout);
                buf.put_slice(&p.stderr);
            }
            Payload::JobStatus(p) => {
                buf.put_u32(p.job_id);
                buf.put_u8(p.state.code());
                buf.put_u8(p.progress);
                buf.put_u32(p.pid);
                buf.put_u32(p.queue_position);
                buf.put_u64(p.estimated_wait_ms);
            }
            Payload::Stats(s) => encode_stats(&mut buf, s),
            Payload::AdminText(text) => buf.put_slice(text.as_bytes()),
            Payload::ListClients(p) => {
                buf.put_u8(p.detailed as u8);
                put_fixed_str(&mut buf, &p.filter, width::PATTERN);
            }
            Payload::ListJobs(p) => {
                buf.put_u8(p.filter.code());
                buf.put_u32(p.session_id);
            }
            Payload::ServerStats(p) => {
                buf.put_u8(p.detailed as u8);
                buf.put_u8(p.json as u8);
            }
            Payload::DisconnectClient(p) => {
                buf.put_u32(p.session_id);
                buf.put_u8(p.force as u8);
            }
            Payload::KillJob(p) => {
                buf.put_u32(p.job_id);
                buf.put_u8(p.force as u8);
            }
            Payload::ServerShutdown(p) => {
                buf.put_u8(p.graceful as u8);
                buf.put_u32(p.delay_seconds);
            }
            Payload::ConfigGet { key } => {
                put_fixed_str(&mut buf, key, width::CONFIG_KEY);
            }
            Payload::ConfigSet(p) => {
                put_fixed_str(&mut buf, &p.key, width::CONFIG_KEY);
                put_fixed_str(&mut buf, &p.value, width::CONFIG_VALUE);
            }
            Payload::BulkDisconnect(p) => {
                buf.put_u8(p.mode.code());
                buf.put_u32(p.idle_secs);
                put_fixed_str(&mut buf, &p.pattern, width::PATTERN);
                buf.put_u32(p.except_session);
            }
        }
        buf.freeze()
    }

    /// Parse payload bytes according to the frame's message type. Trailing
    /// bytes after a fixed-layout payload are malformed.
    pub fn decode(msg_type: MessageType, mut buf: Bytes) -> Result<Self, WireError> {
        let payload = match msg_type {
            MessageType::Hello => Payload::Hello(decode_hello(&mut buf)?),
            MessageType::HelloOk => Payload::HelloOk(decode_hello(&mut buf)?),
            MessageType::FileUploadStart => {
                let filename = get_fixed_str(&mut buf, width::FILENAME)?;
                need(&buf, 8)?;
                let total_size = buf.get_u64();
                Payload::FileUploadStart(FileUploadStart { filename, total_size })
            }
            MessageType::FileUploadChunk => {
                need(&buf, 8)?;
                let chunk_index = buf.get_u32();
                let data_len = buf.get_u32() as usize;
                if buf.remaining() < data_len {
                    return Err(WireError::Truncated);
                }
                let data = buf.copy_to_bytes(data_len).to_vec();
                Payload::FileUploadChunk(FileUploadChunk { chunk_index, data })
            }
            MessageType::FileUploadEnd => {
                let filename = get_fixed_str(&mut buf, width::FILENAME)?;
                Payload::FileUploadEnd(NamedFile { filename })
            }
            MessageType::CompileRequest => {
                need(&buf, 4)?;
                let language_code = buf.get_u8();
                let mode_code = buf.get_u8();
                let priority = buf.get_u8();
                let _reserved = buf.get_u8();
                let language = Language::from_code(language_code).ok_or_else(|| {
                    WireError::Malformed(format!("unknown language {language_code}"))
                })?;
                let mode = JobMode::from_code(mode_code).ok_or_else(|| {
                    WireError::Malformed(format!("unknown job mode {mode_code}"))
                })?;
                let filename = get_fixed_str(&mut buf, width::FILENAME)?;
                let compiler_args = get_fixed_str(&mut buf, width::ARGS)?;
                let execution_args = get_fixed_str(&mut buf, width::ARGS)?;
                Payload::CompileRequest(CompileRequest {
                    language,
                    mode,
                    priority,
                    filename,
                    compiler_args,
                    execution_args,
                })
            }
            MessageType::StatusRequest => {
                need(&buf, 4)?;
                Payload::StatusRequest { job_id: buf.get_u32() }
            }
            MessageType::ResultRequest => {
                need(&buf, 4)?;
                Payload::ResultRequest { job_id: buf.get_u32() }
            }
            MessageType::Ping => Payload::Ping,
            MessageType::Pong => Payload::Pong,
            MessageType::Ack => Payload::Ack,
            MessageType::AdminConnect => Payload::AdminConnect,
            MessageType::ConfigList => Payload::ConfigList,
            MessageType::ReorderQueue => Payload::ReorderQueue,
            MessageType::Error => {
                need(&buf, 2)?;
                let code = buf.get_u16();
                let kind = ErrorKind::from_code(code).ok_or_else(|| {
                    WireError::Malformed(format!("unknown error code {code}"))
                })?;
                let message = get_fixed_str(&mut buf, width::ERROR_MESSAGE)?;
                let context = get_fixed_str(&mut buf, width::ERROR_CONTEXT)?;
                Payload::Error(ErrorPayload { kind, message, context })
            }
            MessageType::CompileResponse => {
                need(&buf, 25)?;
                let job_id = buf.get_u32();
                let status_code = buf.get_u8();
                let exit_code = buf.get_i32();
                let out_len = buf.get_u32() as usize;
                let err_len = buf.get_u32() as usize;
                let time_ms = buf.get_u64();
                let status = JobState::from_code(status_code).ok_or_else(|| {
                    WireError::Malformed(format!("unknown job state {status_code}"))
                })?;
                if buf.remaining() < out_len + err_len {
                    return Err(WireError::Truncated);
                }
                let stdout = buf.copy_to_bytes(out_len).to_vec();
                let stderr = buf.copy_to_bytes(err_len).to_vec();
                Payload::CompileResponse(CompileResponse {
                    job_id,
                    status,
                    exit_code,
                    time_ms,
                    stdout,
                    stderr,
                })
            }
            MessageType::JobStatus => {
                need(&buf, 22)?;
                let job_id = buf.get_u32();
                let state_code = buf.get_u8();
                let progress = buf.get_u8();
                let pid = buf.get_u32();
                let queue_position = buf.get_u32();
                let estimated_wait_ms = buf.get_u64();
                let state = JobState::from_code(state_code).ok_or_else(|| {
                    WireError::Malformed(format!("unknown job state {state_code}"))
                })?;
                Payload::JobStatus(JobStatusPayload {
                    job_id,
                    state,
                    progress,
                    pid,
                    queue_position,
                    estimated_wait_ms,
                })
            }
            MessageType::StatsPayload => Payload::Stats(decode_stats(&mut buf)?),
            MessageType::AdminText => {
                let raw = buf.copy_to_bytes(buf.remaining());
                let text = String::from_utf8(raw.to_vec())
                    .map_err(|_| WireError::Malformed("admin text is not UTF-8".to_string()))?;
                Payload::AdminText(text)
            }
            MessageType::ListClients => {
                need(&buf, 1)?;
                let detailed = buf.get_u8() != 0;
                let filter = get_fixed_str(&mut buf, width::PATTERN)?;
                Payload::ListClients(ListClients { detailed, filter })
            }
            MessageType::ListJobs => {
                need(&buf, 5)?;
                let filter = JobFilter::from_code(buf.get_u8())?;
                let session_id = buf.get_u32();
                Payload::ListJobs(ListJobs { filter, session_id })
            }
            MessageType::ServerStats => {
                need(&buf, 2)?;
                let detailed = buf.get_u8() != 0;
                let json = buf.get_u8() != 0;
                Payload::ServerStats(StatsRequest { detailed, json })
            }
            MessageType::DisconnectClient => {
                need(&buf, 5)?;
                let session_id = buf.get_u32();
                let force = buf.get_u8() != 0;
                Payload::DisconnectClient(DisconnectClient { session_id, force })
            }
            MessageType::KillJob => {
                need(&buf, 5)?;
                let job_id = buf.get_u32();
                let force = buf.get_u8() != 0;
                Payload::KillJob(KillJob { job_id, force })
            }
            MessageType::ServerShutdown => {
                need(&buf, 5)?;
                let graceful = buf.get_u8() != 0;
                let delay_seconds = buf.get_u32();
                Payload::ServerShutdown(ServerShutdown { graceful, delay_seconds })
            }
            MessageType::ConfigGet => {
                let key = get_fixed_str(&mut buf, width::CONFIG_KEY)?;
                Payload::ConfigGet { key }
            }
            MessageType::ConfigSet => {
                let key = get_fixed_str(&mut buf, width::CONFIG_KEY)?;
                let value = get_fixed_str(&mut buf, width::CONFIG_VALUE)?;
                Payload::ConfigSet(ConfigSetPayload { key, value })
            }
            MessageType::BulkDisconnect => {
                need(&buf, 5)?;
                let mode = BulkDisconnectMode::from_code(buf.get_u8())?;
                let idle_secs = buf.get_u32();
                let pattern = get_fixed_str(&mut buf, width::PATTERN)?;
                need(&buf, 4)?;
                let except_session = buf.get_u32();
                Payload::BulkDisconnect(BulkDisconnect {
                    mode,
                    idle_secs,
                    pattern,
                    except_session,
                })
            }
        };

        if buf.has_remaining() {
            return Err(WireError::Malformed(format!(
                "{} trailing bytes after payload",
                buf.remaining()
            )));
        }
        Ok(payload)
    }
}

fn need(buf: &impl Buf, n: usize) -> Result<(), WireError> {
    if buf.remaining() < n {
        return Err(WireError::Truncated);
    }
    Ok(())
}

fn decode_hello(buf: &mut Bytes) -> Result<Hello, WireError> {
    let name = get_fixed_str(buf, width::NAME)?;
    let platform = get_fixed_str(buf, width::PLATFORM)?;
    let version = get_fixed_str(buf, width::VERSION)?;
    Ok(Hello { name, platform, version })
}

fn encode_stats(buf: &mut BytesMut, s: &ServerStatsSnapshot) {
    buf.put_u64(s.start_epoch_ms);
    buf.put_u64(s.uptime_ms);
    buf.put_u32(s.total_sessions);
    buf.put_u32(s.active_sessions);
    buf.put_u32(s.total_jobs);
    buf.put_u32(s.active_jobs);
    buf.put_u32(s.completed_jobs);
    buf.put_u32(s.failed_jobs);
    buf.put_u32(s.cancelled_jobs);
    buf.put_u32(s.timeout_jobs);
    buf.put_u64(s.bytes_in);
    buf.put_u64(s.bytes_out);
    buf.put_u32(s.successful_compilations);
    buf.put_u32(s.failed_compilations);
    buf.put_u32(s.successful_executions);
    buf.put_u32(s.failed_executions);
    buf.put_u64(s.avg_job_ms);
    buf.put_u64(s.avg_compile_ms);
    buf.put_u64(s.avg_exec_ms);
    buf.put_u32(s.files_tracked);
    buf.put_u32(s.admin_commands);
}

fn decode_stats(buf: &mut Bytes) -> Result<ServerStatsSnapshot, WireError> {
    // 6 × u64 + 15 × u32
    need(buf, 6 * 8 + 15 * 4)?;
    Ok(ServerStatsSnapshot {
        start_epoch_ms: buf.get_u64(),
        uptime_ms: buf.get_u64(),
        total_sessions: buf.get_u32(),
        active_sessions: buf.get_u32(),
        total_jobs: buf.get_u32(),
        active_jobs: buf.get_u32(),
        completed_jobs: buf.get_u32(),
        failed_jobs: buf.get_u32(),
        cancelled_jobs: buf.get_u32(),
        timeout_jobs: buf.get_u32(),
        bytes_in: buf.get_u64(),
        bytes_out: buf.get_u64(),
        successful_compilations: buf.get_u32(),
        failed_compilations: buf.get_u32(),
        successful_executions: buf.get_u32(),
        failed_executions: buf.get_u32(),
        avg_job_ms: buf.get_u64(),
        avg_compile_ms: buf.get_u64(),
        avg_exec_ms: buf.get_u64(),
        files_tracked: buf.get_u32(),
        admin_commands: buf.get_u32(),
    })
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
