// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end exchanges against an in-process daemon on a loopback port.
//!
//! The injected registry maps the "python" language onto `/bin/sh`, so
//! interpreted jobs run real child processes without any toolchain on the
//! host. Wall-clock bounds are shortened where a scenario needs a timeout.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mill_core::{Config, ErrorKind, JobMode, JobState, Language};
use mill_daemon::{lifecycle, DaemonDeps, RunningDaemon};
use mill_toolchain::{CompilerDescriptor, CompilerRegistry, ExecLimits};
use mill_wire::{
    read_message, write_message, CompileRequest, FileUploadChunk, FileUploadStart, Hello,
    JobStatusPayload, Message, NamedFile, Payload, StatsRequest,
};
use tokio::net::{TcpStream, UnixStream};

fn sh_registry() -> Arc<CompilerRegistry> {
    Arc::new(CompilerRegistry::from_descriptors(vec![CompilerDescriptor {
        language: Language::Python,
        executable: PathBuf::from("/bin/sh"),
        runtime: None,
        version: "sh".into(),
        default_args: String::new(),
        supports_debug: false,
        supports_optimize: false,
        priority: 7,
    }]))
}

async fn start_daemon(dir: &Path, limits: ExecLimits) -> RunningDaemon {
    let mut config = Config::rooted_at(dir);
    config.listen_addr = "127.0.0.1:0".parse().unwrap();
    let deps = DaemonDeps { registry: sh_registry(), limits };
    lifecycle::start(config, deps).await.unwrap()
}

struct Client {
    stream: TcpStream,
    next_corr: u32,
}

impl Client {
    async fn connect(daemon: &RunningDaemon) -> Self {
        let stream = TcpStream::connect(daemon.local_addr()).await.unwrap();
        Self { stream, next_corr: 1 }
    }

    /// Send one request and read its reply, asserting correlation pairing.
    async fn call(&mut self, payload: Payload) -> Message {
        let corr = self.next_corr;
        self.next_corr += 1;
        write_message(&mut self.stream, &payload, corr, 0).await.unwrap();
        let reply = read_message(&mut self.stream).await.unwrap();
        assert_eq!(reply.header.correlation, corr, "reply paired to the wrong request");
        reply
    }

    async fn hello(&mut self) {
        let reply = self
            .call(Payload::Hello(Hello {
                name: "spec-client".into(),
                platform: "linux".into(),
                version: "1.0.0".into(),
            }))
            .await;
        match reply.payload {
            Payload::HelloOk(identity) => assert_eq!(identity.name, "milld"),
            other => panic!("expected HelloOk, got {other:?}"),
        }
    }

    async fn upload(&mut self, name: &str, bytes: &[u8]) {
        let start = self
            .call(Payload::FileUploadStart(FileUploadStart {
                filename: name.into(),
                total_size: bytes.len() as u64,
            }))
            .await;
        assert_eq!(start.payload, Payload::Ack);

        for (index, chunk) in bytes.chunks(1024).enumerate() {
            let reply = self
                .call(Payload::FileUploadChunk(FileUploadChunk {
                    chunk_index: index as u32,
                    data: chunk.to_vec(),
                }))
                .await;
            assert_eq!(reply.payload, Payload::Ack);
        }

        let end = self
            .call(Payload::FileUploadEnd(NamedFile { filename: name.into() }))
            .await;
        assert_eq!(end.payload, Payload::Ack);
    }

    async fn submit(&mut self, name: &str) -> u32 {
        let reply = self
            .call(Payload::CompileRequest(CompileRequest {
                language: Language::Python,
                mode: JobMode::InterpretOnly,
                priority: 5,
                filename: name.into(),
                compiler_args: String::new(),
                execution_args: String::new(),
            }))
            .await;
        match reply.payload {
            Payload::CompileResponse(resp) => {
                assert_eq!(resp.status, JobState::Queued);
                resp.job_id
            }
            other => panic!("expected CompileResponse, got {other:?}"),
        }
    }

    async fn status(&mut self, job_id: u32) -> JobStatusPayload {
        match self.call(Payload::StatusRequest { job_id }).await.payload {
            Payload::JobStatus(status) => status,
            other => panic!("expected JobStatus, got {other:?}"),
        }
    }

    async fn wait_terminal(&mut self, job_id: u32, within: Duration) -> JobStatusPayload {
        let deadline = std::time::Instant::now() + within;
        loop {
            let status = self.status(job_id).await;
            if status.state.is_terminal() {
                return status;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "job {job_id} never became terminal (last: {status:?})"
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

struct Admin {
    stream: UnixStream,
    next_corr: u32,
}

impl Admin {
    async fn connect(daemon: &RunningDaemon) -> Self {
        let stream = UnixStream::connect(daemon.admin_socket_path()).await.unwrap();
        Self { stream, next_corr: 1_000 }
    }

    async fn call(&mut self, payload: Payload) -> Message {
        let corr = self.next_corr;
        self.next_corr += 1;
        write_message(&mut self.stream, &payload, corr, 0).await.unwrap();
        let reply = read_message(&mut self.stream).await.unwrap();
        assert_eq!(reply.header.correlation, corr);
        reply
    }

    async fn handshake(&mut self) {
        let reply = self.call(Payload::AdminConnect).await;
        assert_eq!(reply.payload, Payload::Ack);
    }
}

#[tokio::test]
async fn submit_status_result_happy_path() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start_daemon(dir.path(), ExecLimits::default()).await;
    let mut client = Client::connect(&daemon).await;

    client.hello().await;
    client.upload("hello.py", b"echo hi\n").await;
    let job_id = client.submit("hello.py").await;

    let status = client.wait_terminal(job_id, Duration::from_secs(10)).await;
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(status.progress, 100);

    match client.call(Payload::ResultRequest { job_id }).await.payload {
        Payload::CompileResponse(result) => {
            assert_eq!(result.status, JobState::Completed);
            assert_eq!(result.exit_code, 0);
            assert_eq!(result.stdout, b"hi\n");
            assert!(result.stderr.is_empty());
        }
        other => panic!("expected CompileResponse, got {other:?}"),
    }

    daemon.trigger_shutdown();
    daemon.wait().await;
}

#[tokio::test]
async fn failing_job_returns_stderr_and_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start_daemon(dir.path(), ExecLimits::default()).await;
    let mut client = Client::connect(&daemon).await;

    client.hello().await;
    client.upload("bad.py", b"echo undeclared variable >&2\nexit 1\n").await;
    let job_id = client.submit("bad.py").await;
    client.wait_terminal(job_id, Duration::from_secs(10)).await;

    match client.call(Payload::ResultRequest { job_id }).await.payload {
        Payload::CompileResponse(result) => {
            assert_eq!(result.status, JobState::Failed);
            assert_eq!(result.exit_code, 1);
            assert!(String::from_utf8_lossy(&result.stderr).contains("undeclared"));
        }
        other => panic!("expected CompileResponse, got {other:?}"),
    }

    daemon.trigger_shutdown();
    daemon.wait().await;
}

#[tokio::test]
async fn spinning_job_times_out_with_124() {
    let dir = tempfile::tempdir().unwrap();
    let limits = ExecLimits {
        compile: Duration::from_secs(5),
        execute: Duration::from_millis(500),
    };
    let daemon = start_daemon(dir.path(), limits).await;
    let mut client = Client::connect(&daemon).await;

    client.hello().await;
    client.upload("spin.py", b"sleep 60\n").await;
    let job_id = client.submit("spin.py").await;

    let status = client.wait_terminal(job_id, Duration::from_secs(10)).await;
    assert_eq!(status.state, JobState::Timeout);

    match client.call(Payload::ResultRequest { job_id }).await.payload {
        Payload::CompileResponse(result) => assert_eq!(result.exit_code, 124),
        other => panic!("expected CompileResponse, got {other:?}"),
    }

    daemon.trigger_shutdown();
    daemon.wait().await;
}

#[tokio::test]
async fn sessions_cannot_see_each_others_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start_daemon(dir.path(), ExecLimits::default()).await;

    let mut alice = Client::connect(&daemon).await;
    alice.hello().await;
    alice.upload("prog.py", b"echo mine\n").await;
    let job_id = alice.submit("prog.py").await;

    let mut bob = Client::connect(&daemon).await;
    bob.hello().await;
    match bob.call(Payload::ResultRequest { job_id }).await.payload {
        Payload::Error(err) => assert_eq!(err.kind, ErrorKind::Permission),
        other => panic!("expected Permission error, got {other:?}"),
    }
    match bob.call(Payload::StatusRequest { job_id }).await.payload {
        Payload::Error(err) => assert_eq!(err.kind, ErrorKind::Permission),
        other => panic!("expected Permission error, got {other:?}"),
    }

    // The owner still gets the artefacts.
    alice.wait_terminal(job_id, Duration::from_secs(10)).await;
    match alice.call(Payload::ResultRequest { job_id }).await.payload {
        Payload::CompileResponse(result) => assert_eq!(result.stdout, b"mine\n"),
        other => panic!("expected CompileResponse, got {other:?}"),
    }

    daemon.trigger_shutdown();
    daemon.wait().await;
}

#[tokio::test]
async fn admin_is_gated_until_handshake() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start_daemon(dir.path(), ExecLimits::default()).await;
    let mut admin = Admin::connect(&daemon).await;

    // Any command pre-handshake is refused and has no effect.
    let reply = admin
        .call(Payload::ServerStats(StatsRequest { detailed: false, json: false }))
        .await;
    match reply.payload {
        Payload::Error(err) => assert_eq!(err.kind, ErrorKind::Permission),
        other => panic!("expected Permission error, got {other:?}"),
    }

    admin.handshake().await;
    let reply = admin
        .call(Payload::ServerStats(StatsRequest { detailed: false, json: false }))
        .await;
    match reply.payload {
        Payload::Stats(snapshot) => assert_eq!(snapshot.admin_commands, 1),
        other => panic!("expected Stats, got {other:?}"),
    }

    daemon.trigger_shutdown();
    daemon.wait().await;
}

#[tokio::test]
async fn admin_stats_count_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start_daemon(dir.path(), ExecLimits::default()).await;
    let mut client = Client::connect(&daemon).await;

    client.hello().await;
    client.upload("ok.py", b"echo hi\n").await;
    let ok = client.submit("ok.py").await;
    client.wait_terminal(ok, Duration::from_secs(10)).await;

    client.upload("bad.py", b"exit 1\n").await;
    let bad = client.submit("bad.py").await;
    client.wait_terminal(bad, Duration::from_secs(10)).await;

    let mut admin = Admin::connect(&daemon).await;
    admin.handshake().await;
    match admin
        .call(Payload::ServerStats(StatsRequest { detailed: false, json: false }))
        .await
        .payload
    {
        Payload::Stats(snapshot) => {
            assert_eq!(snapshot.total_jobs, 2);
            assert_eq!(snapshot.completed_jobs, 1);
            assert_eq!(snapshot.failed_jobs, 1);
            assert_eq!(snapshot.active_jobs, 0);
            assert_eq!(snapshot.active_sessions, 1);
        }
        other => panic!("expected Stats, got {other:?}"),
    }

    daemon.trigger_shutdown();
    daemon.wait().await;
}

#[tokio::test]
async fn admin_kill_cancels_a_running_job() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start_daemon(dir.path(), ExecLimits::default()).await;
    let mut client = Client::connect(&daemon).await;

    client.hello().await;
    client.upload("spin.py", b"sleep 60\n").await;
    let job_id = client.submit("spin.py").await;

    // Wait until the child is running (pid visible), then kill it.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = client.status(job_id).await;
        if status.state == JobState::Running && status.pid != 0 {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "job never started running");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let mut admin = Admin::connect(&daemon).await;
    admin.handshake().await;
    let reply = admin
        .call(Payload::KillJob(mill_wire::KillJob { job_id, force: false }))
        .await;
    assert_eq!(reply.payload, Payload::Ack);

    let status = client.wait_terminal(job_id, Duration::from_secs(5)).await;
    assert_eq!(status.state, JobState::Cancelled);
    match client.call(Payload::ResultRequest { job_id }).await.payload {
        Payload::CompileResponse(result) => assert_eq!(result.exit_code, 128 + 15),
        other => panic!("expected CompileResponse, got {other:?}"),
    }

    daemon.trigger_shutdown();
    daemon.wait().await;
}

#[tokio::test]
async fn second_admin_connection_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start_daemon(dir.path(), ExecLimits::default()).await;

    let mut first = Admin::connect(&daemon).await;
    first.handshake().await;

    let mut second = Admin::connect(&daemon).await;
    // The refusal arrives unprompted with a zero correlation id.
    let reply = read_message(&mut second.stream).await.unwrap();
    match reply.payload {
        Payload::Error(err) => assert_eq!(err.kind, ErrorKind::Permission),
        other => panic!("expected Permission error, got {other:?}"),
    }

    daemon.trigger_shutdown();
    daemon.wait().await;
}

#[tokio::test]
async fn idle_session_is_reaped_after_the_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::rooted_at(dir.path());
    config.listen_addr = "127.0.0.1:0".parse().unwrap();
    config.tunables.client_timeout_secs = 5;
    let deps = DaemonDeps { registry: sh_registry(), limits: ExecLimits::default() };
    let daemon = lifecycle::start(config, deps).await.unwrap();

    let mut client = Client::connect(&daemon).await;
    client.hello().await;

    // Stay silent past the timeout; the server closes the socket with no
    // notice.
    tokio::time::sleep(Duration::from_secs(7)).await;
    write_message(&mut client.stream, &Payload::Ping, 99, 0).await.ok();
    let err = read_message(&mut client.stream).await;
    assert!(err.is_err(), "expected the reaped socket to be closed");

    daemon.trigger_shutdown();
    daemon.wait().await;
}
