// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uploaded-filename validation.
//!
//! A filename is a bare basename: no separators, no traversal, no control
//! bytes, no reserved device names, at most 255 bytes. Everything the
//! manager writes under its roots passes through here first.

use mill_core::limits::MAX_FILENAME_BYTES;

use crate::error::FileError;

/// Reserved device names, rejected with or without an extension.
const RESERVED: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Validate an uploaded filename. Returns the reason on rejection.
pub fn validate_filename(name: &str) -> Result<(), FileError> {
    let fail = |reason: &'static str| Err(FileError::UnsafeFilename(name.to_string(), reason));

    if name.is_empty() {
        return fail("empty");
    }
    if name.len() > MAX_FILENAME_BYTES {
        return fail("longer than 255 bytes");
    }
    if name.contains('/') || name.contains('\\') {
        return fail("contains a path separator");
    }
    if name.contains("..") {
        return fail("contains dot-dot");
    }
    if name.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return fail("contains control characters");
    }

    let stem = name.split('.').next().unwrap_or(name);
    if RESERVED.iter().any(|r| stem.eq_ignore_ascii_case(r)) {
        return fail("reserved device name");
    }

    Ok(())
}

#[cfg(test)]
#[path = "names_tests.rs"]
mod tests;
