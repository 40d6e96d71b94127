// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const ALL: [MessageType; 28] = [
    MessageType::Hello,
    MessageType::FileUploadStart,
    MessageType::FileUploadChunk,
    MessageType::FileUploadEnd,
    MessageType::CompileRequest,
    MessageType::StatusRequest,
    MessageType::ResultRequest,
    MessageType::Ping,
    MessageType::HelloOk,
    MessageType::Ack,
    MessageType::Error,
    MessageType::CompileResponse,
    MessageType::JobStatus,
    MessageType::Pong,
    MessageType::StatsPayload,
    MessageType::AdminText,
    MessageType::AdminConnect,
    MessageType::ListClients,
    MessageType::ListJobs,
    MessageType::ServerStats,
    MessageType::DisconnectClient,
    MessageType::KillJob,
    MessageType::ServerShutdown,
    MessageType::ConfigGet,
    MessageType::ConfigSet,
    MessageType::ConfigList,
    MessageType::BulkDisconnect,
    MessageType::ReorderQueue,
];

#[test]
fn codes_roundtrip() {
    for ty in ALL {
        assert_eq!(MessageType::from_code(ty.code()).unwrap(), ty);
    }
}

#[test]
fn unknown_codes_rejected() {
    for code in [0u16, 9, 99, 108, 199, 212, 255, u16::MAX] {
        assert!(matches!(
            MessageType::from_code(code),
            Err(WireError::UnknownType { value }) if value == code
        ));
    }
}

#[test]
fn ranges_partition_correctly() {
    for ty in ALL {
        let code = ty.code();
        assert_eq!(ty.is_admin(), code >= 200, "{ty:?}");
        assert_eq!(ty.is_response(), (100..200).contains(&code), "{ty:?}");
    }
}
