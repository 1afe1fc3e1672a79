//! Shared fixtures: a producer-side ledger builder and helpers
//!
//! The builder writes the same wire format the engine reads: framed
//! transactions with packed table sections, closed by signature frames
//! whose signatures cover the running Merkle root.
#![allow(dead_code)]

use replay_core::crypto::{hash_bytes, KeyPair};
use replay_core::frame::encode_frame;
use replay_core::merkle::{MerkleHistory, DEFAULT_MAX_HISTORY_LEN};
use replay_core::types::{
    History, HistoryId, NodeId, SignatureRecord, HISTORIES_TABLE, SIGNATURES_TABLE,
};
use replay_core::verify::NodeCert;
use replay_core::{Ledger, Snapshot, SnapshotWriter, TimePoint};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Node id used by all fixtures
pub const NODE: NodeId = 1;

pub fn pack<T: serde::Serialize + ?Sized>(value: &T) -> Vec<u8> {
    rmp_serde::to_vec(value).unwrap()
}

pub fn history(c_id: u64, date: &str) -> History {
    History {
        c_id,
        c_d_id: 1,
        c_w_id: 1,
        d_id: 1,
        w_id: 1,
        date: date.to_string(),
        amount: 10.0,
        data: "fixture".to_string(),
    }
}

/// Date string `i` minutes after a fixed 2024 base instant
pub fn date_at(i: u64) -> String {
    let base = replay_core::parse_date("2024-01-01 00:00:00")
        .unwrap()
        .timestamp();
    TimePoint::from_timestamp(base + (i as i64) * 60).to_string()
}

pub fn tp(date: &str) -> TimePoint {
    replay_core::parse_date(date).unwrap()
}

pub fn sorted(mut ids: Vec<u64>) -> Vec<u64> {
    ids.sort_unstable();
    ids
}

/// Builds a ledger byte stream frame by frame
pub struct LedgerBuilder {
    buf: Vec<u8>,
    merkle: MerkleHistory,
    version: u64,
    keypair: KeyPair,
}

impl LedgerBuilder {
    pub fn new() -> Self {
        Self::with_max_history_len(DEFAULT_MAX_HISTORY_LEN)
    }

    pub fn with_max_history_len(max_len: u64) -> Self {
        Self {
            buf: Vec::new(),
            merkle: MerkleHistory::with_max_len(max_len),
            version: 0,
            keypair: KeyPair::from_seed(&[7u8; 32]),
        }
    }

    pub fn certs(&self) -> HashMap<NodeId, NodeCert> {
        let mut certs = HashMap::new();
        certs.insert(NODE, NodeCert::new(self.keypair.public_key()));
        certs
    }

    fn section(name: &str, writes: &[(u64, Vec<u8>)], removes: &[u64]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(pack(&2u64)); // map start marker
        out.extend(pack(name));
        out.extend(pack(&0u64)); // read version
        out.extend(pack(&0u64)); // read count
        out.extend(pack(&(writes.len() as u64)));
        for (key, value) in writes {
            out.extend(pack(key));
            out.extend(value);
        }
        out.extend(pack(&(removes.len() as u64)));
        for key in removes {
            out.extend(pack(key));
        }
        out
    }

    fn push_frame(&mut self, public: Vec<u8>) -> [u8; 32] {
        let frame = encode_frame(&public, b"opaque-private-payload");
        let leaf = hash_bytes(&frame);
        self.buf.extend(frame);
        leaf
    }

    /// Append one transaction writing (and removing) keys of `table`
    pub fn append_writes(&mut self, table: &str, writes: &[(u64, Vec<u8>)], removes: &[u64]) {
        self.version += 1;
        let mut public = pack(&self.version);
        public.extend(Self::section(table, writes, removes));
        let leaf = self.push_frame(public);
        self.merkle.append(leaf);
    }

    /// Append one transaction carrying a single history entry
    pub fn append_history(&mut self, id: HistoryId, entry: &History) {
        self.append_writes(HISTORIES_TABLE, &[(id, pack(entry))], &[]);
    }

    /// Close the current batch with a signature frame
    pub fn sign_batch(&mut self) {
        self.version += 1;

        // Same window discipline as the verifying reader
        if self.version >= self.merkle.max_len() {
            self.merkle.flush(self.version - self.merkle.max_len());
        }
        let root = self.merkle.root();

        let record = SignatureRecord::new(NODE, self.keypair.sign(&root));
        let mut public = pack(&self.version);
        public.extend(Self::section(
            SIGNATURES_TABLE,
            &[(self.version, pack(&record))],
            &[],
        ));

        let leaf = self.push_frame(public);
        self.merkle.append(leaf);
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, &self.buf).unwrap();
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::from_bytes(self.buf.clone(), [HISTORIES_TABLE])
    }
}

/// A built ledger together with its certificates and live view
pub struct Fixture {
    pub ledger: Ledger,
    pub certs: HashMap<NodeId, NodeCert>,
    pub view: BTreeMap<HistoryId, History>,
}

/// Ledger of `n` history entries in date order, one signature frame per
/// `per_batch` entries
///
/// Entry `i` (1-based) has history id `i`, customer id `i`, and date
/// `date_at(i)`.
pub fn sorted_fixture(n: u64, per_batch: u64) -> Fixture {
    let mut builder = LedgerBuilder::new();
    let mut view = BTreeMap::new();

    for i in 1..=n {
        let entry = history(i, &date_at(i));
        builder.append_history(i, &entry);
        view.insert(i, entry);
        if i % per_batch == 0 {
            builder.sign_batch();
        }
    }
    if n % per_batch != 0 {
        builder.sign_batch();
    }

    Fixture {
        ledger: builder.ledger(),
        certs: builder.certs(),
        view,
    }
}

/// Fold the first `batches` signed batches of `ledger` into a snapshot
pub fn snapshot_prefix(ledger: &Ledger, dir: &Path, batches: usize) -> Snapshot {
    let mut writer = SnapshotWriter::new(dir, HISTORIES_TABLE);
    let mut cursor = ledger.begin();
    let mut signed = 0;
    let mut last_version = 0;

    while signed < batches {
        let frame = cursor
            .advance()
            .unwrap()
            .expect("ledger ended before requested batch count");
        writer.append_transaction(frame.raw_slice()).unwrap();

        let domain = frame.domain().unwrap();
        last_version = domain.version();
        if domain.is_signature() {
            signed += 1;
        }
    }

    let witness = dir.join(format!("witness_v{}", last_version));
    writer.create(last_version, witness).unwrap()
}
