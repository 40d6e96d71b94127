// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use mill_core::ErrorKind;

use super::*;

fn roundtrip(payload: Payload) -> Payload {
    let ty = payload.message_type();
    let bytes = payload.encode();
    Payload::decode(ty, bytes).unwrap()
}

#[test]
fn hello_roundtrip() {
    let p = Payload::Hello(Hello {
        name: "client-x".into(),
        platform: "linux".into(),
        version: "1.0.0".into(),
    });
    assert_eq!(roundtrip(p.clone()), p);
}

#[test]
fn compile_request_roundtrip() {
    let p = Payload::CompileRequest(CompileRequest {
        language: Language::Go,
        mode: JobMode::CompileAndRun,
        priority: 8,
        filename: "main.go".into(),
        compiler_args: "-trimpath".into(),
        execution_args: "--verbose one two".into(),
    });
    assert_eq!(roundtrip(p.clone()), p);
}

#[test]
fn compile_request_rejects_unknown_language() {
    let p = Payload::CompileRequest(CompileRequest {
        language: Language::C,
        mode: JobMode::CompileOnly,
        priority: 5,
        filename: "a.c".into(),
        compiler_args: String::new(),
        execution_args: String::new(),
    });
    let mut raw = p.encode().to_vec();
    raw[0] = 99; // language byte
    let err = Payload::decode(MessageType::CompileRequest, raw.into()).unwrap_err();
    assert!(matches!(err, WireError::Malformed(_)));
}

#[test]
fn compile_response_carries_output_tails() {
    let p = Payload::CompileResponse(CompileResponse {
        job_id: 42,
        status: JobState::Completed,
        exit_code: 0,
        time_ms: 17,
        stdout: b"hi\n".to_vec(),
        stderr: Vec::new(),
    });
    match roundtrip(p.clone()) {
        Payload::CompileResponse(r) => {
            assert_eq!(r.stdout, b"hi\n");
            assert!(r.stderr.is_empty());
            assert_eq!(r.time_ms, 17);
        }
        other => panic!("wrong variant: {other:?}"),
    }
}

#[test]
fn compile_response_truncated_tail() {
    let p = Payload::CompileResponse(CompileResponse {
        job_id: 1,
        status: JobState::Completed,
        exit_code: 0,
        time_ms: 0,
        stdout: b"0123456789".to_vec(),
        stderr: Vec::new(),
    });
    let mut raw = p.encode().to_vec();
    raw.truncate(raw.len() - 4);
    let err = Payload::decode(MessageType::CompileResponse, raw.into()).unwrap_err();
    assert!(matches!(err, WireError::Truncated));
}

#[test]
fn upload_chunk_roundtrip() {
    let p = Payload::FileUploadChunk(FileUploadChunk {
        chunk_index: 3,
        data: vec![0xAB; 1024],
    });
    assert_eq!(roundtrip(p.clone()), p);
}

#[test]
fn error_payload_roundtrip() {
    let p = Payload::Error(ErrorPayload {
        kind: ErrorKind::Permission,
        message: "job 9 belongs to another session".into(),
        context: "result".into(),
    });
    assert_eq!(roundtrip(p.clone()), p);
}

#[test]
fn empty_payloads_encode_to_nothing() {
    for p in [Payload::Ping, Payload::Pong, Payload::Ack, Payload::AdminConnect, Payload::ConfigList, Payload::ReorderQueue]
    {
        assert!(p.encode().is_empty());
        assert_eq!(Payload::decode(p.message_type(), Bytes::new()).unwrap(), p);
    }
}

#[test]
fn trailing_bytes_are_malformed() {
    let mut raw = Payload::Ping.encode().to_vec();
    raw.push(0);
    let err = Payload::decode(MessageType::Ping, raw.into()).unwrap_err();
    assert!(matches!(err, WireError::Malformed(_)));
}

#[test]
fn stats_snapshot_roundtrip() {
    let snap = mill_core::ServerStatsSnapshot {
        start_epoch_ms: 1,
        uptime_ms: 2,
        total_sessions: 3,
        active_sessions: 4,
        total_jobs: 5,
        active_jobs: 6,
        completed_jobs: 7,
        failed_jobs: 8,
        cancelled_jobs: 9,
        timeout_jobs: 10,
        bytes_in: 11,
        bytes_out: 12,
        successful_compilations: 13,
        failed_compilations: 14,
        successful_executions: 15,
        failed_executions: 16,
        avg_job_ms: 17,
        avg_compile_ms: 18,
        avg_exec_ms: 19,
        files_tracked: 20,
        admin_commands: 21,
    };
    assert_eq!(roundtrip(Payload::Stats(snap.clone())), Payload::Stats(snap));
}

#[test]
fn admin_payloads_roundtrip() {
    let payloads = vec![
        Payload::ListClients(ListClients { detailed: true, filter: "10.0.".into() }),
        Payload::ListJobs(ListJobs { filter: JobFilter::ForClient, session_id: 12 }),
        Payload::ServerStats(StatsRequest { detailed: false, json: true }),
        Payload::DisconnectClient(DisconnectClient { session_id: 4, force: true }),
        Payload::KillJob(KillJob { job_id: 77, force: false }),
        Payload::ServerShutdown(ServerShutdown { graceful: true, delay_seconds: 5 }),
        Payload::ConfigGet { key: "client_timeout_secs".into() },
        Payload::ConfigSet(ConfigSetPayload {
            key: "max_file_size_bytes".into(),
            value: "1048576".into(),
        }),
        Payload::BulkDisconnect(BulkDisconnect {
            mode: BulkDisconnectMode::AllExcept,
            idle_secs: 0,
            pattern: String::new(),
            except_session: 2,
        }),
        Payload::AdminText("id  state\n1   running\n".into()),
    ];
    for p in payloads {
        assert_eq!(roundtrip(p.clone()), p);
    }
}

#[test]
fn status_request_truncated() {
    let err = Payload::decode(MessageType::StatusRequest, Bytes::from_static(b"\0\0")).unwrap_err();
    assert!(matches!(err, WireError::Truncated));
}
