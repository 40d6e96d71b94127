// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message type registry.
//!
//! Value ranges are part of the protocol: client requests 1–99, responses
//! 100–199, admin commands 200–255.

use crate::error::WireError;

/// Reserved header flag bits. All unused in v1: ignored on receive,
/// zero on send.
pub mod flags {
    pub const COMPRESSED: u16 = 0x0001;
    pub const ENCRYPTED: u16 = 0x0002;
    pub const URGENT: u16 = 0x0004;
    pub const PARTIAL: u16 = 0x0008;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    // Client requests (1–99)
    Hello,
    FileUploadStart,
    FileUploadChunk,
    FileUploadEnd,
    CompileRequest,
    StatusRequest,
    ResultRequest,
    Ping,
    // Responses (100–199)
    HelloOk,
    Ack,
    Error,
    CompileResponse,
    JobStatus,
    Pong,
    StatsPayload,
    AdminText,
    // Admin commands (200–255)
    AdminConnect,
    ListClients,
    ListJobs,
    ServerStats,
    DisconnectClient,
    KillJob,
    ServerShutdown,
    ConfigGet,
    ConfigSet,
    ConfigList,
    BulkDisconnect,
    ReorderQueue,
}

impl MessageType {
    pub fn code(self) -> u16 {
        match self {
            MessageType::Hello => 1,
            MessageType::FileUploadStart => 2,
            MessageType::FileUploadChunk => 3,
            MessageType::FileUploadEnd => 4,
            MessageType::CompileRequest => 5,
            MessageType::StatusRequest => 6,
            MessageType::ResultRequest => 7,
            MessageType::Ping => 8,
            MessageType::HelloOk => 100,
            MessageType::Ack => 101,
            MessageType::Error => 102,
            MessageType::CompileResponse => 103,
            MessageType::JobStatus => 104,
            MessageType::Pong => 105,
            MessageType::StatsPayload => 106,
            MessageType::AdminText => 107,
            MessageType::AdminConnect => 200,
            MessageType::ListClients => 201,
            MessageType::ListJobs => 202,
            MessageType::ServerStats => 203,
            MessageType::DisconnectClient => 204,
            MessageType::KillJob => 205,
            MessageType::ServerShutdown => 206,
            MessageType::ConfigGet => 207,
            MessageType::ConfigSet => 208,
            MessageType::ConfigList => 209,
            MessageType::BulkDisconnect => 210,
            MessageType::ReorderQueue => 211,
        }
    }

    pub fn from_code(value: u16) -> Result<Self, WireError> {
        Ok(match value {
            1 => MessageType::Hello,
            2 => MessageType::FileUploadStart,
            3 => MessageType::FileUploadChunk,
            4 => MessageType::FileUploadEnd,
            5 => MessageType::CompileRequest,
            6 => MessageType::StatusRequest,
            7 => MessageType::ResultRequest,
            8 => MessageType::Ping,
            100 => MessageType::HelloOk,
            101 => MessageType::Ack,
            102 => MessageType::Error,
            103 => MessageType::CompileResponse,
            104 => MessageType::JobStatus,
            105 => MessageType::Pong,
            106 => MessageType::StatsPayload,
            107 => MessageType::AdminText,
            200 => MessageType::AdminConnect,
            201 => MessageType::ListClients,
            202 => MessageType::ListJobs,
            203 => MessageType::ServerStats,
            204 => MessageType::DisconnectClient,
            205 => MessageType::KillJob,
            206 => MessageType::ServerShutdown,
            207 => MessageType::ConfigGet,
            208 => MessageType::ConfigSet,
            209 => MessageType::ConfigList,
            210 => MessageType::BulkDisconnect,
            211 => MessageType::ReorderQueue,
            _ => return Err(WireError::UnknownType { value }),
        })
    }

    /// True for the 200–255 range.
    pub fn is_admin(self) -> bool {
        self.code() >= 200
    }

    /// True for the 100–199 range.
    pub fn is_response(self) -> bool {
        (100..200).contains(&self.code())
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
