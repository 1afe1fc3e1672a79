//! Ledger file access and frame iteration
//!
//! The ledger is opened read-only and buffered whole; cursors borrow the
//! buffer, so constructing additional cursors is cheap. A cursor is a
//! single-pass finite state machine over frame boundaries:
//! `BeforeHeader -> InFrame -> ... -> AtEnd`.

use crate::domain::Domain;
use crate::frame::Frame;
use crate::types::SIGNATURES_TABLE;
use crate::Result;
use std::collections::HashSet;
use std::path::Path;

/// A read-only ledger file held in memory
pub struct Ledger {
    buf: Vec<u8>,
    interest: HashSet<String>,
}

impl Ledger {
    /// Open a ledger file, materializing updates for `tables` during
    /// iteration
    ///
    /// The reserved signatures table is always added to the interest set;
    /// batch boundaries cannot be recognized without it.
    pub fn open<P, I, S>(path: P, tables: I) -> Result<Self>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let buf = std::fs::read(path.as_ref())?;
        tracing::info!(
            path = %path.as_ref().display(),
            size = buf.len(),
            "Opened ledger file"
        );
        Ok(Self::from_bytes(buf, tables))
    }

    /// Wrap an in-memory ledger buffer
    pub fn from_bytes<I, S>(buf: Vec<u8>, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut interest: HashSet<String> = tables.into_iter().map(Into::into).collect();
        interest.insert(SIGNATURES_TABLE.to_string());
        Self { buf, interest }
    }

    /// Ledger length in bytes
    pub fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    /// True for a zero-byte ledger
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Tables materialized during iteration
    pub fn interest(&self) -> &HashSet<String> {
        &self.interest
    }

    /// Cursor positioned at the first frame
    pub fn begin(&self) -> Cursor<'_> {
        self.begin_at(0)
    }

    /// Cursor positioned at a byte offset, used for snapshot-accelerated
    /// replay
    pub fn begin_at(&self, offset: u64) -> Cursor<'_> {
        Cursor {
            ledger: self,
            state: CursorState::BeforeHeader { next: offset },
        }
    }
}

enum CursorState<'a> {
    /// Positioned before the length prefix of the frame at `next`
    BeforeHeader { next: u64 },
    /// A frame header has been read; the frame is current
    InFrame { frame: Frame<'a> },
    /// Past the last frame
    AtEnd,
}

/// Single-pass cursor over ledger frames
///
/// Two cursors over the same ledger compare by [`Cursor::offset`]: equal
/// offsets mean equal positions, and smaller offsets precede larger ones.
pub struct Cursor<'a> {
    ledger: &'a Ledger,
    state: CursorState<'a>,
}

impl<'a> Cursor<'a> {
    /// Offset of the next unread byte
    pub fn offset(&self) -> u64 {
        match &self.state {
            CursorState::BeforeHeader { next } => *next,
            CursorState::InFrame { frame } => frame.next_offset(),
            CursorState::AtEnd => self.ledger.len(),
        }
    }

    /// True while frames remain
    pub fn has_next(&self) -> bool {
        self.offset() < self.ledger.len()
    }

    /// Read the next frame header and yield a view over the frame
    ///
    /// Returns `Ok(None)` once the end of the ledger is reached. Errors from
    /// the frame codec (`ShortRead`, `MalformedFrame`) propagate unchanged.
    pub fn advance(&mut self) -> Result<Option<FrameRef<'a>>> {
        let next = self.offset();
        if next >= self.ledger.len() {
            self.state = CursorState::AtEnd;
            return Ok(None);
        }

        let frame = Frame::decode(&self.ledger.buf, next)?;
        self.state = CursorState::InFrame { frame };
        Ok(Some(FrameRef {
            frame,
            interest: &self.ledger.interest,
        }))
    }
}

/// Borrowed view of one frame, with lazy domain decoding
#[derive(Debug, Clone, Copy)]
pub struct FrameRef<'a> {
    frame: Frame<'a>,
    interest: &'a HashSet<String>,
}

impl<'a> FrameRef<'a> {
    /// Offset of this frame's length prefix
    pub fn offset(&self) -> u64 {
        self.frame.offset
    }

    /// Offset of the frame that follows
    pub fn next_offset(&self) -> u64 {
        self.frame.next_offset()
    }

    /// The `frame_size`-prefixed raw bytes, as hashed into the Merkle
    /// history
    pub fn raw_slice(&self) -> &'a [u8] {
        self.frame.raw
    }

    /// Decode the public domain with the ledger's interest set
    pub fn domain(&self) -> Result<Domain<'a>> {
        Domain::decode(self.frame.public, self.interest)
    }
}
