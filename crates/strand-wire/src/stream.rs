//! Property stream framing
//!
//! Entry = [ID:varint][LEN:u32 LE][PAYLOAD:LEN]
//!
//! Writers size their buffer with `entry_len` before writing. A writer that
//! produces a different count than it promised corrupts every entry that
//! follows it, so callers check `WriteStream::len` against the promise.

use bytes::{BufMut, Bytes, BytesMut};
use strand_core::{PropertyId, StrandError, StrandResult};

use crate::{get_varint, put_varint, varint_len, PropertyValue};

/// Size of the payload length field
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Encoded size of one entry carrying `payload_len` bytes
#[inline]
pub fn entry_len(id: PropertyId, payload_len: usize) -> usize {
    varint_len(id.0) + LENGTH_FIELD_SIZE + payload_len
}

/// Encoded size of one entry carrying `value`
#[inline]
pub fn value_entry_len(id: PropertyId, value: &PropertyValue) -> usize {
    entry_len(id, value.encoded_len())
}

/// Append-only property stream writer
#[derive(Debug, Default)]
pub struct WriteStream {
    buf: BytesMut,
}

impl WriteStream {
    pub fn new() -> Self {
        WriteStream {
            buf: BytesMut::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        WriteStream {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Write an entry with an opaque payload
    pub fn write_bytes(&mut self, id: PropertyId, payload: &[u8]) {
        self.put_header(id, payload.len());
        self.buf.put_slice(payload);
    }

    /// Write an entry carrying a typed value
    pub fn write_value(&mut self, id: PropertyId, value: &PropertyValue) {
        self.put_header(id, value.encoded_len());
        value.encode(&mut self.buf);
    }

    fn put_header(&mut self, id: PropertyId, payload_len: usize) {
        put_varint(&mut self.buf, id.0);
        self.buf.put_u32_le(payload_len as u32);
    }

    /// Bytes written so far
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// One undecoded entry borrowed from the input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawProperty<'a> {
    pub id: PropertyId,
    pub payload: &'a [u8],
}

/// Zero-copy property stream reader
#[derive(Clone, Debug)]
pub struct ReadStream<'a> {
    buf: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> ReadStream<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ReadStream {
            buf,
            offset: 0,
            failed: false,
        }
    }

    /// Read the next entry.
    /// Returns `Ok(None)` once the input is exhausted.
    pub fn next_property(&mut self) -> StrandResult<Option<RawProperty<'a>>> {
        if self.offset >= self.buf.len() {
            return Ok(None);
        }

        let start = self.offset;
        let (id, id_len) =
            get_varint(self.buf, start)?.ok_or(StrandError::TruncatedHeader { offset: start })?;

        let len_start = start + id_len;
        let len_end = len_start + LENGTH_FIELD_SIZE;
        let len_bytes: [u8; LENGTH_FIELD_SIZE] = self
            .buf
            .get(len_start..len_end)
            .and_then(|b| b.try_into().ok())
            .ok_or(StrandError::TruncatedHeader { offset: start })?;
        let declared = u32::from_le_bytes(len_bytes) as usize;

        let remaining = self.buf.len() - len_end;
        if declared > remaining {
            return Err(StrandError::MalformedLength {
                property: PropertyId(id),
                declared,
                remaining,
            });
        }

        self.offset = len_end + declared;
        Ok(Some(RawProperty {
            id: PropertyId(id),
            payload: &self.buf[len_end..self.offset],
        }))
    }

    /// Bytes consumed so far
    #[inline]
    pub fn position(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.offset)
    }
}

impl<'a> Iterator for ReadStream<'a> {
    type Item = StrandResult<RawProperty<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_property() {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
