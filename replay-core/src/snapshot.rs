//! Snapshot records and the snapshot index
//!
//! A [`Snapshot`] describes one immutable snapshot file: where it lives, the
//! ledger offset verified replay resumes from, the trusted content digest,
//! and the domain-defined index value used to rank snapshots for range
//! queries. The [`SnapshotIndex`] keeps records ordered by index value and
//! answers lower-bound lookups; it is safe for concurrent readers with a
//! single writer.

use crate::time::TimePoint;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Registration record of one snapshot file
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Commit version of the last transaction folded in
    pub version: u64,
    /// Byte offset of the next frame after the last folded transaction
    pub ledger_offset: u64,
    /// Snapshot file location
    pub file_path: PathBuf,
    /// Trusted SHA-256 content digest of the file
    pub content_hash: [u8; 32],
    /// Domain-defined sort key; for the history table, the date of the most
    /// recent folded entry. Unset snapshots are rejected by the index.
    pub index_value: Option<TimePoint>,
    /// Persisted Merkle-history state for resuming verified replay
    pub merkle_witness_path: PathBuf,
}

struct IndexInner {
    /// Ordered by (index value, insertion sequence); the sequence component
    /// admits duplicates
    entries: BTreeMap<(TimePoint, u64), Arc<Snapshot>>,
    seq: u64,
}

/// Ordered multi-set of snapshots keyed by index value
pub struct SnapshotIndex {
    inner: RwLock<IndexInner>,
}

impl SnapshotIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(IndexInner {
                entries: BTreeMap::new(),
                seq: 0,
            }),
        }
    }

    /// Register a snapshot
    ///
    /// Snapshots without an index value are logged and ignored.
    pub fn append(&self, snapshot: Snapshot) {
        let Some(index_value) = snapshot.index_value else {
            tracing::warn!(
                version = snapshot.version,
                file = %snapshot.file_path.display(),
                "Rejecting snapshot without an index value"
            );
            return;
        };

        let mut inner = self.inner.write();
        let seq = inner.seq;
        inner.seq += 1;
        inner.entries.insert((index_value, seq), Arc::new(snapshot));
    }

    /// Number of registered snapshots
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// True when no snapshots are registered
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// First snapshot with `index_value >= v`
    pub fn lower_bound(&self, v: TimePoint) -> Option<Arc<Snapshot>> {
        let inner = self.inner.read();
        inner
            .entries
            .range((v, 0)..)
            .next()
            .map(|(_, s)| Arc::clone(s))
    }

    /// Last snapshot with `index_value < v`
    pub fn before(&self, v: TimePoint) -> Option<Arc<Snapshot>> {
        let inner = self.inner.read();
        inner
            .entries
            .range(..(v, 0))
            .next_back()
            .map(|(_, s)| Arc::clone(s))
    }

    /// First snapshot in index order
    pub fn first(&self) -> Option<Arc<Snapshot>> {
        let inner = self.inner.read();
        inner.entries.values().next().map(Arc::clone)
    }

    /// All snapshots in ascending index order
    pub fn snapshots(&self) -> Vec<Arc<Snapshot>> {
        let inner = self.inner.read();
        inner.entries.values().map(Arc::clone).collect()
    }
}

impl Default for SnapshotIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(version: u64, index_value: Option<i64>) -> Snapshot {
        Snapshot {
            version,
            ledger_offset: version * 100,
            file_path: PathBuf::from(format!("snapshot_v{}", version)),
            content_hash: [0u8; 32],
            index_value: index_value.map(TimePoint::from_timestamp),
            merkle_witness_path: PathBuf::from(format!("witness_v{}", version)),
        }
    }

    #[test]
    fn test_iteration_is_ordered_by_index_value() {
        let index = SnapshotIndex::new();
        index.append(snapshot(3, Some(300)));
        index.append(snapshot(1, Some(100)));
        index.append(snapshot(2, Some(200)));

        let versions: Vec<u64> = index.snapshots().iter().map(|s| s.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let index = SnapshotIndex::new();
        index.append(snapshot(1, Some(100)));
        index.append(snapshot(2, Some(100)));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_unset_index_value_is_rejected() {
        let index = SnapshotIndex::new();
        index.append(snapshot(1, None));
        assert!(index.is_empty());
    }

    #[test]
    fn test_lower_bound() {
        let index = SnapshotIndex::new();
        index.append(snapshot(1, Some(100)));
        index.append(snapshot(2, Some(200)));
        index.append(snapshot(3, Some(300)));

        let at = |v: i64| index.lower_bound(TimePoint::from_timestamp(v));
        assert_eq!(at(50).unwrap().version, 1);
        assert_eq!(at(100).unwrap().version, 1);
        assert_eq!(at(150).unwrap().version, 2);
        assert_eq!(at(300).unwrap().version, 3);
        assert!(at(301).is_none());
    }

    #[test]
    fn test_before() {
        let index = SnapshotIndex::new();
        index.append(snapshot(1, Some(100)));
        index.append(snapshot(2, Some(200)));

        let at = |v: i64| index.before(TimePoint::from_timestamp(v));
        assert!(at(100).is_none());
        assert_eq!(at(101).unwrap().version, 1);
        assert_eq!(at(500).unwrap().version, 2);
    }
}
