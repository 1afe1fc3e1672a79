//! Public-domain decoder
//!
//! Parses the cleartext portion of a frame into per-table updates. The
//! decoder is configured with a table-of-interest set: sections for other
//! tables are walked (the cursor must stay in sync) but nothing is stored
//! for them, so queries skip irrelevant tables at near-zero cost.
//!
//! Payload layout, all MessagePack:
//!
//! ```text
//! version
//! per table: map_marker | name | read_version | read_count
//!            | write_count | write_count x (key, value)
//!            | remove_count | remove_count x key
//! ```

use crate::packed::{decode_slice, PackedCursor};
use crate::types::SIGNATURES_TABLE;
use crate::Result;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashSet};

/// A single write, as raw packed bytes borrowed from the frame buffer
#[derive(Debug, Clone, Copy)]
pub struct KvWrite<'a> {
    /// Packed key bytes
    pub key: &'a [u8],
    /// Packed value bytes
    pub value: &'a [u8],
}

/// Decoded public domain of one frame
#[derive(Debug)]
pub struct Domain<'a> {
    version: u64,
    table_names: Vec<String>,
    updates: BTreeMap<String, Vec<KvWrite<'a>>>,
}

impl<'a> Domain<'a> {
    /// Decode a public payload, materializing updates for tables in
    /// `interest` and skipping over everything else
    pub fn decode(public: &'a [u8], interest: &HashSet<String>) -> Result<Self> {
        let mut cur = PackedCursor::new(public);

        let version = cur.read_u64()?;

        let mut table_names = Vec::new();
        let mut updates = BTreeMap::new();

        while !cur.is_empty() {
            cur.read_u64()?; // map start marker
            let name = cur.read_str()?;
            cur.read_u64()?; // read version
            cur.read_u64()?; // read count

            let persist = interest.contains(name);

            let write_count = cur.read_u64()?;
            if persist {
                let mut writes = Vec::with_capacity(write_count as usize);
                for _ in 0..write_count {
                    let key = cur.skip_value()?;
                    let value = cur.skip_value()?;
                    writes.push(KvWrite { key, value });
                }

                let remove_count = cur.read_u64()?;
                for _ in 0..remove_count {
                    cur.skip_value()?; // key
                }

                table_names.push(name.to_string());
                updates.insert(name.to_string(), writes);
            } else {
                for _ in 0..write_count {
                    cur.skip_value()?; // key
                    cur.skip_value()?; // value
                }

                let remove_count = cur.read_u64()?;
                for _ in 0..remove_count {
                    cur.skip_value()?; // key
                }
            }
        }

        Ok(Self {
            version,
            table_names,
            updates,
        })
    }

    /// Commit version of this frame
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Interest-set tables present in this frame, in file order
    pub fn table_names(&self) -> &[String] {
        &self.table_names
    }

    /// True if `name` appears in this frame's recorded tables
    pub fn has_table(&self, name: &str) -> bool {
        self.updates.contains_key(name)
    }

    /// True if this frame updates the reserved signatures table
    pub fn is_signature(&self) -> bool {
        self.has_table(SIGNATURES_TABLE)
    }

    /// Raw packed writes for a table, in file order
    pub fn raw_updates(&self, name: &str) -> Option<&[KvWrite<'a>]> {
        self.updates.get(name).map(|w| w.as_slice())
    }

    /// Decode a table's writes into an ordered map
    pub fn get_table_updates<K, V>(&self, name: &str) -> Result<BTreeMap<K, V>>
    where
        K: DeserializeOwned + Ord,
        V: DeserializeOwned,
    {
        let mut out = BTreeMap::new();
        if let Some(writes) = self.updates.get(name) {
            for write in writes {
                let key: K = decode_slice(write.key)?;
                let value: V = decode_slice(write.value)?;
                out.insert(key, value);
            }
        }
        Ok(out)
    }
}
