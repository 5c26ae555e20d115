//! Request/response frame encoding and decoding
//!
//! Request:  [1-byte type length N][N bytes UTF-8 type][4-byte body length L][L bytes body]
//! Response: [1-byte status][4-byte body length M][M bytes body]
//!
//! Integers are big-endian. Exactly one response follows each request and
//! frames carry no request id.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::bounded::BoundedReader;
use crate::buffer::ByteBuffer;
use crate::error::{ProtocolError, Result};

/// Longest request type tag
pub const MAX_TAG_LEN: usize = u8::MAX as usize;

/// Sanity limit for a frame body (16 MB)
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Status byte of a successful response
pub const STATUS_OK: u8 = 0;

/// A decoded request frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub request_type: String,
    pub body: Bytes,
}

impl Request {
    pub fn new(request_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            request_type: request_type.into(),
            body: body.into(),
        }
    }

    pub fn encode(&self) -> std::result::Result<Bytes, ProtocolError> {
        let tag = self.request_type.as_bytes();
        if tag.len() > MAX_TAG_LEN {
            return Err(ProtocolError::TagTooLong(tag.len()));
        }
        let body_len = checked_body_len(self.body.len())?;

        let mut buf = ByteBuffer::new();
        buf.write_u8(tag.len() as u8);
        buf.write_bytes(tag);
        buf.write_u32(body_len);
        buf.write_bytes(&self.body);
        Ok(buf.freeze())
    }
}

/// A response frame; status 0 is success, anything else is handler-defined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u8,
    pub body: Bytes,
}

impl Response {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::with_status(STATUS_OK, body)
    }

    pub fn empty() -> Self {
        Self::ok(Bytes::new())
    }

    pub fn with_status(status: u8, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Body reader for decoding typed fields
    pub fn reader(&self) -> ByteBuffer {
        ByteBuffer::from_bytes(&self.body)
    }

    pub fn encode(&self) -> std::result::Result<Bytes, ProtocolError> {
        let body_len = checked_body_len(self.body.len())?;

        let mut buf = ByteBuffer::new();
        buf.write_u8(self.status);
        buf.write_u32(body_len);
        buf.write_bytes(&self.body);
        Ok(buf.freeze())
    }
}

fn checked_body_len(len: usize) -> std::result::Result<u32, ProtocolError> {
    if len > MAX_BODY_SIZE {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    Ok(len as u32)
}

/// Read one request frame: type length, then type and body length, then body
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut BoundedReader<R>) -> Result<Request> {
    let mut header = ByteBuffer::from_bytes(&reader.receive(1).await?);
    let tag_len = header.read_u8()? as usize;

    header.write_bytes(&reader.receive(tag_len + 4).await?);
    let tag = header.read_bytes(tag_len)?;
    let request_type = String::from_utf8(tag.to_vec())
        .map_err(|_| ProtocolError::Malformed("request type is not UTF-8".into()))?;

    let body_len = header.read_u32()? as usize;
    if body_len > MAX_BODY_SIZE {
        return Err(ProtocolError::FrameTooLarge(body_len).into());
    }
    let body = reader.receive(body_len).await?;

    Ok(Request { request_type, body })
}

/// Read one response frame: status and body length, then body
pub async fn read_response<R: AsyncRead + Unpin>(
    reader: &mut BoundedReader<R>,
) -> Result<Response> {
    let mut header = ByteBuffer::from_bytes(&reader.receive(5).await?);
    let status = header.read_u8()?;
    let body_len = header.read_u32()? as usize;
    if body_len > MAX_BODY_SIZE {
        return Err(ProtocolError::FrameTooLarge(body_len).into());
    }
    let body = reader.receive(body_len).await?;

    Ok(Response { status, body })
}

/// Write one encoded frame and flush it
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}
