//! Snapshot writer
//!
//! Folds a stream of committed transactions into a per-table set of
//! latest-value updates and serializes them as a content-addressed snapshot
//! file. Key/value bytes are carried as raw packed slices and re-emitted
//! verbatim, never re-encoded.
//!
//! Update queues are kept newest-first: `append_update` prepends, so the
//! reduction walks each queue front to back and keeps the first sighting of
//! every key. A `REMOVE` consumes its key without emitting, which also
//! suppresses any older write of the same key.

use crate::frame::Frame;
use crate::merkle::{MerkleHistory, DEFAULT_MAX_HISTORY_LEN};
use crate::packed::{decode_slice, PackedCursor};
use crate::snapshot::Snapshot;
use crate::time::parse_date;
use crate::types::{History, SIGNATURES_TABLE};
use crate::{crypto, Error, Result};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Write,
    Remove,
}

struct KvUpdate {
    key: Vec<u8>,
    value: Vec<u8>,
    action: Action,
}

/// Accumulates committed transactions and emits a snapshot file
pub struct SnapshotWriter {
    dir: PathBuf,
    indexed_table: String,
    updates: BTreeMap<String, VecDeque<KvUpdate>>,
    merkle: MerkleHistory,
    ledger_offset: u64,
}

impl SnapshotWriter {
    /// Writer emitting into `dir`, extracting the index value from
    /// `indexed_table`
    pub fn new<P: AsRef<Path>>(dir: P, indexed_table: &str) -> Self {
        Self::with_max_history_len(dir, indexed_table, DEFAULT_MAX_HISTORY_LEN)
    }

    /// [`SnapshotWriter::new`] with an explicit Merkle retention window
    pub fn with_max_history_len<P: AsRef<Path>>(
        dir: P,
        indexed_table: &str,
        max_len: u64,
    ) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            indexed_table: indexed_table.to_string(),
            updates: BTreeMap::new(),
            merkle: MerkleHistory::with_max_len(max_len),
            ledger_offset: 0,
        }
    }

    /// Byte offset of the next frame after the last absorbed transaction
    pub fn ledger_offset(&self) -> u64 {
        self.ledger_offset
    }

    /// Absorb one committed transaction (its `frame_size`-prefixed raw
    /// bytes), in commit order
    pub fn append_transaction(&mut self, raw: &[u8]) -> Result<()> {
        let frame = Frame::decode(raw, 0)?;
        if frame.raw.len() != raw.len() {
            return Err(Error::Decode(format!(
                "transaction slice of {} bytes holds a frame of {} bytes",
                raw.len(),
                frame.raw.len()
            )));
        }

        let leaf = crypto::hash_bytes(frame.raw);

        let mut cur = PackedCursor::new(frame.public);
        let version = cur.read_u64()?;
        let mut is_signature = false;

        while !cur.is_empty() {
            cur.read_u64()?; // map start marker
            let name = cur.read_str()?.to_string();
            cur.read_u64()?; // read version
            cur.read_u64()?; // read count

            let write_count = cur.read_u64()?;
            for _ in 0..write_count {
                let key = cur.skip_value()?.to_vec();
                let value = cur.skip_value()?.to_vec();
                self.append_update(
                    &name,
                    KvUpdate {
                        key,
                        value,
                        action: Action::Write,
                    },
                );
            }

            let remove_count = cur.read_u64()?;
            for _ in 0..remove_count {
                let key = cur.skip_value()?.to_vec();
                self.append_update(
                    &name,
                    KvUpdate {
                        key,
                        value: Vec::new(),
                        action: Action::Remove,
                    },
                );
            }

            if name == SIGNATURES_TABLE {
                is_signature = true;
            }
        }

        // Mirror the verified reader's Merkle bookkeeping so the persisted
        // witness matches a from-zero replay
        if is_signature && version >= self.merkle.max_len() {
            self.merkle.flush(version - self.merkle.max_len());
        }
        self.merkle.append(leaf);

        self.ledger_offset += raw.len() as u64;
        Ok(())
    }

    /// Prepend an update so the queue stays newest-first
    fn append_update(&mut self, table: &str, update: KvUpdate) {
        self.updates
            .entry(table.to_string())
            .or_default()
            .push_front(update);
    }

    /// Serialize the accumulated state, persist the Merkle witness, and
    /// return the snapshot record
    pub fn create(self, version: u64, witness_path: PathBuf) -> Result<Snapshot> {
        let file_path = self.dir.join(format!("snapshot_v{}", version));
        let mut file = std::io::BufWriter::new(std::fs::File::create(&file_path)?);

        let mut digest = Sha256::new();
        let mut index_value = None;

        for (name, queue) in &self.updates {
            let mut seen: HashSet<&[u8]> = HashSet::new();
            let mut data: Vec<u8> = Vec::new();

            for update in queue {
                if seen.contains(update.key.as_slice()) {
                    continue;
                }
                seen.insert(update.key.as_slice());

                if update.action == Action::Remove {
                    continue;
                }

                if name == &self.indexed_table && index_value.is_none() {
                    let entry: History = decode_slice(&update.value)?;
                    index_value = Some(parse_date(&entry.date)?);
                }

                data.extend_from_slice(&update.key);
                data.extend_from_slice(&update.value);
            }

            let mut header =
                rmp_serde::to_vec(name.as_str()).map_err(|e| Error::Decode(e.to_string()))?;
            header.extend(
                rmp_serde::to_vec(&(data.len() as u64)).map_err(|e| Error::Decode(e.to_string()))?,
            );

            file.write_all(&(header.len() as u64).to_le_bytes())?;
            file.write_all(&header)?;
            file.write_all(&data)?;

            digest.update(&header);
            digest.update(&data);
        }

        file.flush()?;
        let content_hash: [u8; 32] = digest.finalize().into();

        self.merkle.persist(&witness_path)?;

        tracing::info!(
            version,
            file = %file_path.display(),
            tables = self.updates.len(),
            ledger_offset = self.ledger_offset,
            hash = %hex::encode(content_hash),
            "Snapshot created"
        );

        Ok(Snapshot {
            version,
            ledger_offset: self.ledger_offset,
            file_path,
            content_hash,
            index_value,
            merkle_witness_path: witness_path,
        })
    }
}
