//! Snapshot reader
//!
//! Loads a snapshot file, recomputes the streaming content digest, and
//! verifies it against the trusted hash in the owning [`Snapshot`] record
//! before exposing any data. Table blocks are decoded lazily; the file
//! buffer is retained for the life of the reader.

use crate::packed::{decode_slice, PackedCursor};
use crate::snapshot::Snapshot;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::ops::Range;

/// A verified, lazily-decoded snapshot file
#[derive(Debug)]
pub struct SnapshotReader {
    buf: Vec<u8>,
    /// Table name and data range, in file order
    tables: Vec<(String, Range<usize>)>,
}

impl SnapshotReader {
    /// Open and verify a snapshot file
    ///
    /// Fails with [`Error::SnapshotCorrupt`] if the file's structure is
    /// invalid or its digest does not match the record's `content_hash`.
    pub fn open(snapshot: &Snapshot) -> Result<Self> {
        let buf = std::fs::read(&snapshot.file_path)?;

        let mut digest = Sha256::new();
        let mut tables = Vec::new();
        let mut offset = 0usize;

        while offset < buf.len() {
            let header_size_bytes = buf.get(offset..offset + 8).ok_or_else(|| {
                Error::SnapshotCorrupt(format!("truncated block header at offset {}", offset))
            })?;
            let header_size =
                u64::from_le_bytes(header_size_bytes.try_into().expect("8-byte slice")) as usize;
            offset += 8;

            let header = buf.get(offset..offset + header_size).ok_or_else(|| {
                Error::SnapshotCorrupt(format!("truncated header at offset {}", offset))
            })?;

            let mut cur = PackedCursor::new(header);
            let name = cur.read_str()?.to_string();
            let data_size = cur.read_u64()? as usize;
            offset += header_size;

            let data = buf.get(offset..offset + data_size).ok_or_else(|| {
                Error::SnapshotCorrupt(format!(
                    "table {} data of {} bytes exceeds file",
                    name, data_size
                ))
            })?;

            digest.update(header);
            digest.update(data);

            tables.push((name, offset..offset + data_size));
            offset += data_size;
        }

        let computed: [u8; 32] = digest.finalize().into();
        if computed != snapshot.content_hash {
            tracing::warn!(
                version = snapshot.version,
                expected = %hex::encode(snapshot.content_hash),
                computed = %hex::encode(computed),
                "Snapshot digest mismatch"
            );
            return Err(Error::SnapshotCorrupt(format!(
                "digest mismatch for {}",
                snapshot.file_path.display()
            )));
        }

        tracing::debug!(
            version = snapshot.version,
            tables = tables.len(),
            size = buf.len(),
            "Snapshot verified"
        );

        Ok(Self { buf, tables })
    }

    /// Table names, in file order
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Decode a table's packed (key, value) stream into an ordered map
    ///
    /// Returns an empty map for a table not present in the snapshot.
    pub fn get_table<K, V>(&self, name: &str) -> Result<BTreeMap<K, V>>
    where
        K: DeserializeOwned + Ord,
        V: DeserializeOwned,
    {
        let mut out = BTreeMap::new();

        let Some((_, range)) = self.tables.iter().find(|(n, _)| n == name) else {
            return Ok(out);
        };

        let mut cur = PackedCursor::new(&self.buf[range.clone()]);
        while !cur.is_empty() {
            let key: K = decode_slice(cur.skip_value()?)?;
            let value: V = decode_slice(cur.skip_value()?)?;
            out.insert(key, value);
        }
        Ok(out)
    }
}
