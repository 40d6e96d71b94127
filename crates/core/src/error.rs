// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the service.
//!
//! Every recoverable failure that reaches a client is projected into a
//! [`Fault`]: a taxonomy kind with a stable wire code, a free-form message,
//! and a short context string. Component crates keep their own thiserror
//! enums and convert at the dispatch boundary.

use serde::{Deserialize, Serialize};

/// Failure categories with stable wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed payload, unknown message type, validation failure.
    InvalidArgument,
    /// Operation in the wrong session state, cross-session job access,
    /// or an admin command before the handshake.
    Permission,
    /// No such job or file.
    NotFound,
    /// File too large, too many active jobs, queue or buffer full.
    QuotaExceeded,
    /// Allocator failure.
    MemoryAllocation,
    /// Compile or execute exceeded its wall-clock bound.
    Timeout,
    /// Toolchain exited non-zero while compiling.
    Compilation,
    /// Toolchain exited non-zero while running.
    Execution,
    /// Transport I/O failure.
    Network,
    /// Local filesystem failure.
    FileIo,
    /// Requested language not detected at startup.
    UnsupportedLanguage,
    /// Invariant violation. Never expected.
    Internal,
}

impl ErrorKind {
    /// Stable numeric code carried in the wire `Error` payload.
    pub fn code(self) -> u16 {
        match self {
            ErrorKind::InvalidArgument => 1,
            ErrorKind::Permission => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::QuotaExceeded => 4,
            ErrorKind::MemoryAllocation => 5,
            ErrorKind::Timeout => 6,
            ErrorKind::Compilation => 7,
            ErrorKind::Execution => 8,
            ErrorKind::Network => 9,
            ErrorKind::FileIo => 10,
            ErrorKind::UnsupportedLanguage => 11,
            ErrorKind::Internal => 12,
        }
    }

    /// Inverse of [`ErrorKind::code`].
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1 => ErrorKind::InvalidArgument,
            2 => ErrorKind::Permission,
            3 => ErrorKind::NotFound,
            4 => ErrorKind::QuotaExceeded,
            5 => ErrorKind::MemoryAllocation,
            6 => ErrorKind::Timeout,
            7 => ErrorKind::Compilation,
            8 => ErrorKind::Execution,
            9 => ErrorKind::Network,
            10 => ErrorKind::FileIo,
            11 => ErrorKind::UnsupportedLanguage,
            12 => ErrorKind::Internal,
            _ => return None,
        })
    }
}

crate::simple_display! {
    ErrorKind {
        InvalidArgument => "invalid argument",
        Permission => "permission denied",
        NotFound => "not found",
        QuotaExceeded => "quota exceeded",
        MemoryAllocation => "memory allocation failed",
        Timeout => "timed out",
        Compilation => "compilation failed",
        Execution => "execution failed",
        Network => "network error",
        FileIo => "file I/O error",
        UnsupportedLanguage => "unsupported language",
        Internal => "internal error",
    }
}

/// A client-visible failure: taxonomy kind plus human detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: ErrorKind,
    pub message: String,
    /// Short machine-greppable context, e.g. the operation name.
    pub context: String,
}

impl Fault {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self { kind, message: message.into(), context: context.into() }
    }

    pub fn invalid(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message, context)
    }

    pub fn permission(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message, context)
    }

    pub fn not_found(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message, context)
    }

    pub fn internal(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message, context)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
