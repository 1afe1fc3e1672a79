//! Verified time-range query engine over an append-only signed ledger
//!
//! # Architecture
//!
//! - **Frame codec**: length-prefixed records with an opaque encrypted
//!   header and a cleartext public payload
//! - **Public domain**: self-describing packed per-table updates, decoded
//!   against a table-of-interest set
//! - **Merkle history**: rolling SHA-256 tree over raw frame bytes with
//!   bounded retention and witness resume
//! - **Verified reader**: batches end at signature frames and are emitted
//!   only after the embedded signature matches the Merkle root
//! - **Snapshots**: content-addressed latest-value files with an ordered
//!   index for range-query resume
//!
//! # Invariants
//!
//! - Frame offset order equals commit-version order within a ledger file
//! - No frame is observable before its batch verifies
//! - Results are complete or an error is raised; never partial

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod frame;
pub mod ledger;
pub mod merkle;
pub mod packed;
pub mod query;
pub mod reader;
pub mod snapshot;
pub mod snapshot_reader;
pub mod snapshot_writer;
pub mod time;
pub mod types;
pub mod verify;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use merkle::{MerkleHistory, DEFAULT_MAX_HISTORY_LEN};
pub use query::{HistoryQuery, HistoryView, QueryOutcome, Strategy};
pub use reader::{Batch, VerifiedReader};
pub use snapshot::{Snapshot, SnapshotIndex};
pub use snapshot_reader::SnapshotReader;
pub use snapshot_writer::SnapshotWriter;
pub use time::{parse_date, TimePoint};
pub use types::{History, HistoryId, NodeId, SignatureRecord};
pub use verify::{NodeCert, NodeCertLookup};
