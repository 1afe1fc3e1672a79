//! Rolling Merkle history over raw frame bytes
//!
//! This module provides an incremental Merkle tree with bounded retention:
//!
//! - Binary Merkle tree with SHA-256 hashing
//! - Incremental, append-only updates with a cached root
//! - Bounded window: leaves below a flush point are dropped, and the root
//!   from then on covers the remaining window
//! - Witness persistence, so that verified replay can resume mid-ledger with
//!   exactly the state a from-zero replay would have
//!
//! A leaf is the SHA-256 of one frame's `frame_size`-prefixed raw bytes.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Default Merkle retention window
pub const DEFAULT_MAX_HISTORY_LEN: u64 = 1000;

/// Hash a pair of hashes (used for internal nodes)
fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Persisted Merkle-history state
#[derive(Serialize, Deserialize)]
struct Witness {
    base: u64,
    leaves: Vec<[u8; 32]>,
}

/// Append-only Merkle tree over a bounded window of leaves
pub struct MerkleHistory {
    /// Retained leaves; `leaves[0]` has index `base`
    leaves: Vec<[u8; 32]>,
    /// Index of the first retained leaf
    base: u64,
    /// Retention window policy
    max_len: u64,
    /// Cached root hash
    cached_root: Option<[u8; 32]>,
    /// Set after a witness resume; flushes are suppressed until the window
    /// has accumulated naturally
    resumed: bool,
}

impl MerkleHistory {
    /// Create an empty history with the default retention window
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_HISTORY_LEN)
    }

    /// Create an empty history with an explicit retention window
    pub fn with_max_len(max_len: u64) -> Self {
        Self {
            leaves: Vec::new(),
            base: 0,
            max_len,
            cached_root: None,
            resumed: false,
        }
    }

    /// Retention window policy
    pub fn max_len(&self) -> u64 {
        self.max_len
    }

    /// Number of retained leaves
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// True when no leaves are retained
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Index of the first retained leaf
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Index the next appended leaf will receive
    pub fn next_index(&self) -> u64 {
        self.base + self.leaves.len() as u64
    }

    /// Append a new leaf
    pub fn append(&mut self, leaf: [u8; 32]) {
        self.leaves.push(leaf);
        self.cached_root = None; // Invalidate cache
    }

    /// Drop leaves with index <= `upto`
    ///
    /// After a witness resume the call is ignored until the retained window
    /// has grown back to the policy length, so the resumed root sequence
    /// matches a from-zero replay.
    pub fn flush(&mut self, upto: u64) {
        if self.resumed {
            if (self.leaves.len() as u64) < self.max_len {
                return;
            }
            self.resumed = false;
        }

        if upto < self.base {
            return;
        }

        let drop = ((upto - self.base + 1) as usize).min(self.leaves.len());
        self.leaves.drain(..drop);
        self.base += drop as u64;
        self.cached_root = None;
    }

    /// Compute the Merkle root over the retained window
    pub fn root(&mut self) -> [u8; 32] {
        if let Some(root) = self.cached_root {
            return root;
        }

        let root = Self::compute_root(&self.leaves);
        self.cached_root = Some(root);
        root
    }

    /// Compute root from leaves (internal)
    fn compute_root(leaves: &[[u8; 32]]) -> [u8; 32] {
        if leaves.is_empty() {
            return [0u8; 32];
        }

        if leaves.len() == 1 {
            return leaves[0];
        }

        let mut current_level = leaves.to_vec();

        while current_level.len() > 1 {
            let mut next_level = Vec::new();

            for i in (0..current_level.len()).step_by(2) {
                let left = current_level[i];
                let right = if i + 1 < current_level.len() {
                    current_level[i + 1]
                } else {
                    // Duplicate last hash if odd
                    current_level[i]
                };

                next_level.push(hash_pair(&left, &right));
            }

            current_level = next_level;
        }

        current_level[0]
    }

    /// Persist the retained window as a witness file
    pub fn persist(&self, path: &Path) -> Result<()> {
        let witness = Witness {
            base: self.base,
            leaves: self.leaves.clone(),
        };
        let bytes =
            bincode::serialize(&witness).map_err(|e| Error::Decode(e.to_string()))?;
        std::fs::write(path, bytes)?;
        tracing::debug!(
            path = %path.display(),
            leaves = self.leaves.len(),
            base = self.base,
            "Persisted Merkle witness"
        );
        Ok(())
    }

    /// Restore a history from a witness file
    ///
    /// Subsequent `root()` values match what a from-zero replay would
    /// produce at the witness's ledger position.
    pub fn resume(path: &Path, max_len: u64) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let witness: Witness = bincode::deserialize(&bytes)
            .map_err(|e| Error::Decode(format!("merkle witness {}: {}", path.display(), e)))?;
        Ok(Self {
            leaves: witness.leaves,
            base: witness.base,
            max_len,
            cached_root: None,
            resumed: true,
        })
    }
}

impl Default for MerkleHistory {
    fn default() -> Self {
        Self::new()
    }
}
