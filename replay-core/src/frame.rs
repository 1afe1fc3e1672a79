//! Ledger frame codec
//!
//! On-disk layout of one frame:
//!
//! ```text
//! u32 LE frame_size | 28 bytes encrypted header | u64 LE public_size
//!                   | public_payload[public_size] | private_payload[..]
//! ```
//!
//! The encrypted header is a 16-byte authentication tag followed by a
//! 12-byte IV; both are opaque here. The codec hands out borrowed slices and
//! never allocates.

use crate::{Error, Result};

/// Width of the `frame_size` length prefix
pub const FRAME_SIZE_FIELD: usize = 4;
/// Width of the `public_size` field
pub const PUBLIC_SIZE_FIELD: usize = 8;
/// Width of the AES-GCM authentication tag
pub const GCM_SIZE_TAG: usize = 16;
/// Width of the AES-GCM IV
pub const GCM_SIZE_IV: usize = 12;
/// Width of the full encrypted header
pub const GCM_SIZE_FIELD: usize = GCM_SIZE_TAG + GCM_SIZE_IV;

/// A decoded frame, borrowing from the ledger buffer
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Offset of the frame's length prefix within the file
    pub offset: u64,
    /// Value of the length prefix (frame contents, prefix excluded)
    pub frame_size: u32,
    /// The `frame_size`-prefixed region: prefix plus contents
    pub raw: &'a [u8],
    /// The public payload
    pub public: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Decode the frame starting at `offset` in `buf`
    pub fn decode(buf: &'a [u8], offset: u64) -> Result<Self> {
        let start = offset as usize;

        let size_bytes = buf
            .get(start..start + FRAME_SIZE_FIELD)
            .ok_or(Error::ShortRead(offset))?;
        let frame_size = u32::from_le_bytes(size_bytes.try_into().expect("4-byte slice"));

        let contents_start = start + FRAME_SIZE_FIELD;
        let contents_end = contents_start
            .checked_add(frame_size as usize)
            .ok_or_else(|| Error::MalformedFrame {
                offset,
                reason: "frame size overflows".to_string(),
            })?;
        let contents = buf
            .get(contents_start..contents_end)
            .ok_or(Error::ShortRead(offset))?;

        let header_len = GCM_SIZE_FIELD + PUBLIC_SIZE_FIELD;
        if contents.len() < header_len {
            return Err(Error::MalformedFrame {
                offset,
                reason: format!("frame of {} bytes cannot hold its header", contents.len()),
            });
        }

        let public_size_bytes = &contents[GCM_SIZE_FIELD..header_len];
        let public_size = u64::from_le_bytes(public_size_bytes.try_into().expect("8-byte slice"));

        let public_end =
            (header_len as u64)
                .checked_add(public_size)
                .ok_or_else(|| Error::MalformedFrame {
                    offset,
                    reason: "public size overflows".to_string(),
                })?;
        if public_end > contents.len() as u64 {
            return Err(Error::MalformedFrame {
                offset,
                reason: format!(
                    "public payload of {} bytes exceeds frame of {} bytes",
                    public_size,
                    contents.len()
                ),
            });
        }

        Ok(Self {
            offset,
            frame_size,
            raw: &buf[start..contents_end],
            public: &contents[header_len..public_end as usize],
        })
    }

    /// Offset of the next frame's length prefix
    pub fn next_offset(&self) -> u64 {
        self.offset + self.raw.len() as u64
    }
}

/// Assemble frame bytes from a public and private payload
///
/// Producer-side counterpart of [`Frame::decode`]; the encrypted header is
/// left zeroed because its contents are opaque to this crate.
pub fn encode_frame(public: &[u8], private: &[u8]) -> Vec<u8> {
    let contents_len = GCM_SIZE_FIELD + PUBLIC_SIZE_FIELD + public.len() + private.len();
    let mut out = Vec::with_capacity(FRAME_SIZE_FIELD + contents_len);
    out.extend_from_slice(&(contents_len as u32).to_le_bytes());
    out.extend_from_slice(&[0u8; GCM_SIZE_FIELD]);
    out.extend_from_slice(&(public.len() as u64).to_le_bytes());
    out.extend_from_slice(public);
    out.extend_from_slice(private);
    out
}
