//! Verified ledger reader
//!
//! Composes the cursor, the Merkle history, and the signature verifier into
//! a batch iterator. A batch is the run of frames up to and including the
//! next signature frame; it is only handed to the caller once the signature
//! over the Merkle root has been verified. There is no speculative emission:
//! on verification failure nothing is returned and the reader must be
//! dropped.

use crate::ledger::{Cursor, Ledger};
use crate::merkle::{MerkleHistory, DEFAULT_MAX_HISTORY_LEN};
use crate::verify::{verify_signature_frame, NodeCertLookup};
use crate::{crypto, domain::Domain, Error, Result};
use std::path::Path;

/// A verified run of frames ending in a signature frame
pub struct Batch<'a> {
    /// Decoded public domains in cursor order, signature frame last
    pub domains: Vec<Domain<'a>>,
    /// Commit version of the closing signature frame
    pub version: u64,
}

/// Batch reader with cumulative Merkle verification
pub struct VerifiedReader<'a, C: NodeCertLookup> {
    cursor: Cursor<'a>,
    merkle: MerkleHistory,
    certs: &'a C,
    frames_read: u64,
    failed: Option<u64>,
}

impl<'a, C: NodeCertLookup> VerifiedReader<'a, C> {
    /// Reader over the whole ledger, starting with an empty Merkle history
    pub fn new(ledger: &'a Ledger, certs: &'a C) -> Self {
        Self::with_history(ledger.begin(), certs, MerkleHistory::new())
    }

    /// Reader with an explicit Merkle retention window
    pub fn with_max_history_len(ledger: &'a Ledger, certs: &'a C, max_len: u64) -> Self {
        Self::with_history(ledger.begin(), certs, MerkleHistory::with_max_len(max_len))
    }

    /// Resume verified replay at `offset`, seeding the Merkle history from a
    /// persisted witness
    pub fn resume(
        ledger: &'a Ledger,
        certs: &'a C,
        offset: u64,
        witness_path: &Path,
    ) -> Result<Self> {
        Self::resume_with_max_history_len(
            ledger,
            certs,
            offset,
            witness_path,
            DEFAULT_MAX_HISTORY_LEN,
        )
    }

    /// [`VerifiedReader::resume`] with an explicit retention window
    pub fn resume_with_max_history_len(
        ledger: &'a Ledger,
        certs: &'a C,
        offset: u64,
        witness_path: &Path,
        max_len: u64,
    ) -> Result<Self> {
        let merkle = MerkleHistory::resume(witness_path, max_len)?;
        tracing::info!(
            offset,
            witness = %witness_path.display(),
            leaves = merkle.len(),
            "Resuming verified replay from witness"
        );
        Ok(Self::with_history(ledger.begin_at(offset), certs, merkle))
    }

    fn with_history(cursor: Cursor<'a>, certs: &'a C, merkle: MerkleHistory) -> Self {
        Self {
            cursor,
            merkle,
            certs,
            frames_read: 0,
            failed: None,
        }
    }

    /// True while the cursor has not reached the end of the ledger
    pub fn has_next(&self) -> bool {
        self.cursor.has_next()
    }

    /// Byte offset of the next unread frame
    pub fn offset(&self) -> u64 {
        self.cursor.offset()
    }

    /// Frames consumed so far
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Persist the current Merkle window as a witness file
    pub fn save_witness(&self, path: &Path) -> Result<()> {
        self.merkle.persist(path)
    }

    /// Read frames up to and including the next signature frame
    ///
    /// Returns the verified batch, or `Ok(None)` when no complete signed
    /// batch remains (end of ledger; an unsigned tail is never emitted).
    /// Returns [`Error::VerificationFailed`] when the signature does not
    /// match the Merkle root; the reader must not be reused afterwards.
    pub fn read_batch(&mut self) -> Result<Option<Batch<'a>>> {
        if let Some(version) = self.failed {
            return Err(Error::VerificationFailed(version));
        }

        let mut domains = Vec::new();

        while let Some(frame) = self.cursor.advance()? {
            self.frames_read += 1;
            let leaf = crypto::hash_bytes(frame.raw_slice());
            let domain = frame.domain()?;

            if domain.is_signature() {
                let version = domain.version();

                // Flush the Merkle window before computing the root, exactly
                // as the signing node did
                if version >= self.merkle.max_len() {
                    self.merkle.flush(version - self.merkle.max_len());
                }

                let root = self.merkle.root();
                let verified = verify_signature_frame(&domain, &root, self.certs)?;

                // The signature frame's own bytes enter the tree after the
                // root it signs
                self.merkle.append(leaf);

                if !verified {
                    tracing::warn!(
                        version,
                        root = %hex::encode(root),
                        "Batch verification failed"
                    );
                    self.failed = Some(version);
                    return Err(Error::VerificationFailed(version));
                }

                tracing::debug!(
                    version,
                    frames = domains.len() + 1,
                    root = %hex::encode(root),
                    "Batch verified"
                );

                domains.push(domain);
                return Ok(Some(Batch { domains, version }));
            }

            self.merkle.append(leaf);
            domains.push(domain);
        }

        if !domains.is_empty() {
            tracing::debug!(
                frames = domains.len(),
                "Unsigned tail at end of ledger; not emitted"
            );
        }
        Ok(None)
    }
}
