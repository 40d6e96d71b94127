// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The 32-byte frame header.

use bytes::{Buf, BufMut};
use mill_core::limits::MAX_FRAME_BYTES;

use crate::error::WireError;
use crate::types::MessageType;

/// `"CCEE"` in ASCII.
pub const MAGIC: u32 = 0x4343_4545;

/// Encoded header size in bytes.
pub const HEADER_LEN: usize = 32;

/// Offset of the checksum field within the encoded header.
const CHECKSUM_OFFSET: usize = 28;

/// Frame header. All integers are big-endian on the wire; the checksum is
/// CRC32-C over the 32 header bytes with the checksum field zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub msg_type: MessageType,
    pub flags: u16,
    /// Payload length in bytes.
    pub length: u32,
    /// Sender-chosen id echoed by the matching reply.
    pub correlation: u32,
    pub timestamp_ms: u64,
}

impl Header {
    pub fn new(msg_type: MessageType, correlation: u32, length: u32, timestamp_ms: u64) -> Self {
        Self { msg_type, flags: 0, length, correlation, timestamp_ms }
    }

    /// Serialize, computing a fresh checksum.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut raw = [0u8; HEADER_LEN];
        {
            let mut buf = &mut raw[..];
            buf.put_u32(MAGIC);
            buf.put_u16(self.msg_type.code());
            buf.put_u16(self.flags);
            buf.put_u32(self.length);
            buf.put_u32(self.correlation);
            buf.put_u64(self.timestamp_ms);
            buf.put_u32(0); // checksum placeholder
        }
        let checksum = crc32c::crc32c(&raw);
        raw[CHECKSUM_OFFSET..].copy_from_slice(&checksum.to_be_bytes());
        raw
    }

    /// Parse and validate: magic, checksum, payload cap, known type —
    /// in that order.
    pub fn decode(raw: &[u8; HEADER_LEN]) -> Result<Self, WireError> {
        let mut buf = &raw[..];
        let magic = buf.get_u32();
        if magic != MAGIC {
            return Err(WireError::BadMagic { found: magic });
        }

        let type_code = buf.get_u16();
        let flags = buf.get_u16();
        let length = buf.get_u32();
        let correlation = buf.get_u32();
        let timestamp_ms = buf.get_u64();
        let found_checksum = buf.get_u32();

        let mut zeroed = *raw;
        zeroed[CHECKSUM_OFFSET..].fill(0);
        let expected = crc32c::crc32c(&zeroed);
        if expected != found_checksum {
            return Err(WireError::BadChecksum { expected, found: found_checksum });
        }

        if length > MAX_FRAME_BYTES {
            return Err(WireError::PayloadTooLarge { length });
        }

        let msg_type = MessageType::from_code(type_code)?;
        Ok(Self { msg_type, flags, length, correlation, timestamp_ms })
    }
}

#[cfg(test)]
#[path = "header_tests.rs"]
mod tests;
