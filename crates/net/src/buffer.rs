//! Growable byte buffer with independent read and write cursors
//!
//! All multi-byte integers are big-endian (network order). Both ends of the
//! protocol rely on this; changing it is a breaking protocol change.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Append-only writer plus a consuming reader over the same bytes
#[derive(Debug, Clone, Default)]
pub struct ByteBuffer {
    data: BytesMut,
    read_pos: usize,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer positioned to read `bytes` from the start
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: BytesMut::from(bytes),
            read_pos: 0,
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.data.put_u16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.data.put_u32(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.put_slice(bytes);
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        let [value] = self.take::<1>()?;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    /// Consume exactly `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, ProtocolError> {
        self.ensure(len)?;
        let bytes = Bytes::copy_from_slice(&self.data[self.read_pos..self.read_pos + len]);
        self.read_pos += len;
        Ok(bytes)
    }

    /// Bytes written but not yet read
    pub fn unread(&self) -> &[u8] {
        &self.data[self.read_pos..]
    }

    /// Everything written so far, regardless of the read cursor
    pub fn written(&self) -> &[u8] {
        &self.data
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Freeze everything written into an immutable buffer
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }

    fn ensure(&self, need: usize) -> Result<(), ProtocolError> {
        let available = self.remaining();
        if need > available {
            return Err(ProtocolError::Truncated { need, available });
        }
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.read_pos..self.read_pos + N]);
        self.read_pos += N;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_are_big_endian() {
        let mut buf = ByteBuffer::new();
        buf.write_u8(0x01);
        buf.write_u16(0x0203);
        buf.write_u32(0x0405_0607);

        assert_eq!(buf.written(), &[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(buf.read_u8().unwrap(), 0x01);
        assert_eq!(buf.read_u16().unwrap(), 0x0203);
        assert_eq!(buf.read_u32().unwrap(), 0x0405_0607);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_cursors_are_independent() {
        let mut buf = ByteBuffer::new();
        buf.write_bytes(b"abc");
        assert_eq!(&buf.read_bytes(2).unwrap()[..], b"ab");

        buf.write_bytes(b"de");
        assert_eq!(buf.unread(), b"cde");
        assert_eq!(buf.written(), b"abcde");
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_read_past_end_fails() {
        let mut buf = ByteBuffer::from_bytes(&[0x00, 0x01, 0x02]);

        assert_eq!(
            buf.read_u32(),
            Err(ProtocolError::Truncated {
                need: 4,
                available: 3
            })
        );
        // A failed read consumes nothing
        assert_eq!(buf.read_u16().unwrap(), 0x0001);
        assert!(buf.read_bytes(2).is_err());
        assert_eq!(buf.read_u8().unwrap(), 0x02);
        assert!(buf.read_u8().is_err());
    }

    #[test]
    fn test_zero_length_read() {
        let mut buf = ByteBuffer::new();
        assert!(buf.read_bytes(0).unwrap().is_empty());
    }
}
