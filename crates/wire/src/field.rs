// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-width NUL-padded string fields.

use bytes::{Buf, BufMut};

use crate::error::WireError;

/// Declared widths of the protocol's fixed string fields, in bytes.
/// Content is capped at width − 1 so every field stays NUL-terminated.
pub mod width {
    pub const NAME: usize = 64;
    pub const PLATFORM: usize = 32;
    pub const VERSION: usize = 16;
    pub const FILENAME: usize = 256;
    pub const ARGS: usize = 256;
    pub const ERROR_MESSAGE: usize = 128;
    pub const ERROR_CONTEXT: usize = 64;
    pub const CONFIG_KEY: usize = 64;
    pub const CONFIG_VALUE: usize = 128;
    pub const PATTERN: usize = 64;
}

/// Write `s` into a `width`-byte field, truncating to `width − 1` bytes on a
/// char boundary and padding the rest with NULs.
pub fn put_fixed_str(buf: &mut impl BufMut, s: &str, width: usize) {
    let mut end = s.len().min(width - 1);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    let bytes = &s.as_bytes()[..end];
    buf.put_slice(bytes);
    buf.put_bytes(0, width - bytes.len());
}

/// Read a `width`-byte field and return the content before the first NUL.
/// A field with no NUL or with non-UTF-8 content is malformed.
pub fn get_fixed_str(buf: &mut impl Buf, width: usize) -> Result<String, WireError> {
    if buf.remaining() < width {
        return Err(WireError::Truncated);
    }
    let mut raw = vec![0u8; width];
    buf.copy_to_slice(&mut raw);
    let end = raw
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| WireError::Malformed(format!("string field missing NUL in {width} bytes")))?;
    raw.truncate(end);
    String::from_utf8(raw)
        .map_err(|_| WireError::Malformed("string field is not UTF-8".to_string()))
}

#[cfg(test)]
#[path = "field_tests.rs"]
mod tests;
