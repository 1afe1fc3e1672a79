//! Positioned cursor over a MessagePack stream
//!
//! Decoded values borrow from the underlying buffer, and every read reports
//! the exact byte range it consumed so callers can re-emit objects without
//! re-encoding them (the snapshot writer depends on this).

use crate::{Error, Result};
use rmpv::decode::read_value_ref;
use rmpv::ValueRef;
use serde::de::DeserializeOwned;

/// Cursor over packed objects in `buf`, tracking the current offset
pub struct PackedCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PackedCursor<'a> {
    /// Create a cursor at the start of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current byte offset into the buffer
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// True when every byte has been consumed
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Decode the next packed object, returning it together with the bytes
    /// it occupied
    pub fn read_value(&mut self) -> Result<(ValueRef<'a>, &'a [u8])> {
        let mut rest = &self.buf[self.pos..];
        let before = rest.len();
        let value = read_value_ref(&mut rest)
            .map_err(|e| Error::Decode(format!("packed object at offset {}: {}", self.pos, e)))?;
        let consumed = before - rest.len();
        let raw = &self.buf[self.pos..self.pos + consumed];
        self.pos += consumed;
        Ok((value, raw))
    }

    /// Skip the next packed object, returning the bytes it occupied
    pub fn skip_value(&mut self) -> Result<&'a [u8]> {
        let (_, raw) = self.read_value()?;
        Ok(raw)
    }

    /// Decode the next packed object as an unsigned integer
    pub fn read_u64(&mut self) -> Result<u64> {
        let at = self.pos;
        match self.read_value()? {
            (ValueRef::Integer(n), _) => n
                .as_u64()
                .ok_or_else(|| Error::Decode(format!("negative integer at offset {}", at))),
            (other, _) => Err(Error::Decode(format!(
                "expected integer at offset {}, found {}",
                at, other
            ))),
        }
    }

    /// Decode the next packed object as a UTF-8 string
    pub fn read_str(&mut self) -> Result<&'a str> {
        let at = self.pos;
        match self.read_value()? {
            (ValueRef::String(s), _) => s
                .into_str()
                .ok_or_else(|| Error::Decode(format!("non-UTF-8 string at offset {}", at))),
            (other, _) => Err(Error::Decode(format!(
                "expected string at offset {}, found {}",
                at, other
            ))),
        }
    }
}

/// Decode a single packed object slice into a typed value
pub fn decode_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    rmp_serde::from_slice(bytes).map_err(|e| Error::Decode(e.to_string()))
}
