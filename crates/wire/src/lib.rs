// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary wire protocol shared by the session and admin transports.
//!
//! Frame format: a 32-byte big-endian header (magic, type, flags, length,
//! correlation id, timestamp, CRC32-C checksum) followed by `length` payload
//! bytes. Fixed-width string fields are NUL-terminated within their declared
//! width.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod codec;
mod error;
mod field;
mod header;
mod payload;
mod types;

pub use codec::{read_frame, read_message, write_message, Message};
pub use error::WireError;
pub use header::{Header, HEADER_LEN, MAGIC};
pub use payload::{
    BulkDisconnect, BulkDisconnectMode, CompileRequest, CompileResponse, ConfigSetPayload,
    DisconnectClient, ErrorPayload, FileUploadChunk, FileUploadStart, Hello, JobFilter,
    JobStatusPayload, KillJob, ListClients, ListJobs, NamedFile, Payload, ServerShutdown,
    StatsRequest,
};
pub use types::{flags, MessageType};
