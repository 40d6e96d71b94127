// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use mill_core::{ErrorKind, Fault};
use thiserror::Error;

/// Failures while framing or parsing messages.
///
/// Everything except [`WireError::Malformed`] is unrecoverable for the
/// connection: the peer and the server no longer agree on frame boundaries.
/// `Malformed` means the frame itself was sound but its payload failed
/// schema validation; the session stays usable and the sender gets an
/// `InvalidArgument` reply.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("bad magic: 0x{found:08x}")]
    BadMagic { found: u32 },

    #[error("bad header checksum: expected 0x{expected:08x}, found 0x{found:08x}")]
    BadChecksum { expected: u32, found: u32 },

    #[error("payload of {length} bytes exceeds the frame cap")]
    PayloadTooLarge { length: u32 },

    #[error("unknown message type {value}")]
    UnknownType { value: u16 },

    #[error("stream ended mid-message")]
    Truncated,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl WireError {
    /// True when the connection can continue after an `Error` reply.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WireError::Malformed(_))
    }

    /// Project into the client-visible taxonomy.
    pub fn to_fault(&self) -> Fault {
        match self {
            WireError::Malformed(msg) => Fault::invalid(msg.clone(), "decode"),
            WireError::UnknownType { value } => {
                Fault::invalid(format!("unknown message type {value}"), "decode")
            }
            WireError::Io(e) => Fault::new(ErrorKind::Network, e.to_string(), "transport"),
            other => Fault::new(ErrorKind::Network, other.to_string(), "framing"),
        }
    }
}
