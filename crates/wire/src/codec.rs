// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Async framing over any byte stream.

use bytes::Bytes;
use mill_core::limits::MAX_FRAME_BYTES;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::WireError;
use crate::header::{Header, HEADER_LEN};
use crate::payload::Payload;

/// A fully parsed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub payload: Payload,
}

/// Serialize a payload and emit header-then-payload in one logical write.
/// Returns the number of bytes put on the wire, for session byte counters.
pub async fn write_message<W>(
    writer: &mut W,
    payload: &Payload,
    correlation: u32,
    timestamp_ms: u64,
) -> Result<u64, WireError>
where
    W: AsyncWrite + Unpin,
{
    let body = payload.encode();
    if body.len() as u64 > MAX_FRAME_BYTES as u64 {
        return Err(WireError::PayloadTooLarge { length: body.len() as u32 });
    }
    let header =
        Header::new(payload.message_type(), correlation, body.len() as u32, timestamp_ms);
    writer.write_all(&header.encode()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok((HEADER_LEN + body.len()) as u64)
}

/// Read one validated header plus its raw payload bytes, completing
/// partial reads before surfacing the frame.
///
/// A peer that closes the stream cleanly between messages yields
/// `Io(UnexpectedEof)`; a close mid-frame yields `Truncated`.
pub async fn read_frame<R>(reader: &mut R) -> Result<(Header, Bytes), WireError>
where
    R: AsyncRead + Unpin,
{
    let mut raw = [0u8; HEADER_LEN];
    read_header_bytes(reader, &mut raw).await?;
    let header = Header::decode(&raw)?;

    let mut body = vec![0u8; header.length as usize];
    if !body.is_empty() {
        reader.read_exact(&mut body).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                WireError::Truncated
            } else {
                WireError::Io(e)
            }
        })?;
    }

    Ok((header, Bytes::from(body)))
}

/// Read and fully decode one frame.
pub async fn read_message<R>(reader: &mut R) -> Result<Message, WireError>
where
    R: AsyncRead + Unpin,
{
    let (header, body) = read_frame(reader).await?;
    let payload = Payload::decode(header.msg_type, body)?;
    Ok(Message { header, payload })
}

/// Fill the header buffer, distinguishing a clean close (EOF before any
/// byte) from a mid-header close.
async fn read_header_bytes<R>(reader: &mut R, raw: &mut [u8; HEADER_LEN]) -> Result<(), WireError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut raw[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Err(WireError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }
            return Err(WireError::Truncated);
        }
        filled += n;
    }
    Ok(())
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
