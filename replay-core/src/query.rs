//! Time-range history queries
//!
//! Answers "which customers have history entries in `[from, to]`" through
//! three strategies that trade latency for freshness and verification:
//!
//! - **KV**: scan the live materialized table; no verification.
//! - **Replay**: verified replay of the whole ledger.
//! - **Snapshot**: verified snapshot plus verified replay from the
//!   snapshot's ledger offset.
//!
//! Replay strategies exploit that history ids are assigned in time order
//! and entries are appended in time order: scanning stops at the first
//! entry dated past `to`.

use crate::ledger::Ledger;
use crate::merkle::DEFAULT_MAX_HISTORY_LEN;
use crate::reader::VerifiedReader;
use crate::snapshot::{Snapshot, SnapshotIndex};
use crate::snapshot_reader::SnapshotReader;
use crate::time::{parse_date, TimePoint};
use crate::types::{History, HistoryId, HISTORIES_TABLE};
use crate::verify::NodeCertLookup;
use crate::{domain::Domain, Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Query execution strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Scan the live key-value view
    Kv,
    /// Full verified ledger replay
    Replay,
    /// Snapshot-accelerated verified replay
    Snapshot,
}

/// Read access to the live history table
///
/// Implemented by the external store's materialized view; iteration order
/// carries no guarantee and every entry is checked.
pub trait HistoryView {
    /// Visit entries until the callback returns `false`
    fn for_each(&self, f: &mut dyn FnMut(HistoryId, &History) -> bool);
}

impl HistoryView for BTreeMap<HistoryId, History> {
    fn for_each(&self, f: &mut dyn FnMut(HistoryId, &History) -> bool) {
        for (id, entry) in self {
            if !f(*id, entry) {
                break;
            }
        }
    }
}

/// Result of one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    /// Customer ids of matching entries, duplicates preserved
    pub customer_ids: Vec<u64>,
    /// Ledger frames consumed while answering
    pub frames_read: u64,
}

/// A bounded time-range query over the history table
pub struct HistoryQuery {
    from: TimePoint,
    to: TimePoint,
    max_history_len: u64,
}

impl HistoryQuery {
    /// Query for entries dated within `[from, to]`
    pub fn new(from: TimePoint, to: TimePoint) -> Self {
        Self {
            from,
            to,
            max_history_len: DEFAULT_MAX_HISTORY_LEN,
        }
    }

    /// Override the Merkle retention window used during replay
    pub fn with_max_history_len(mut self, max_len: u64) -> Self {
        self.max_history_len = max_len;
        self
    }

    /// Execute with the chosen strategy
    pub fn run<C, V>(
        &self,
        strategy: Strategy,
        view: &V,
        ledger: &Ledger,
        certs: &C,
        snapshots: &SnapshotIndex,
    ) -> Result<QueryOutcome>
    where
        C: NodeCertLookup,
        V: HistoryView,
    {
        match strategy {
            Strategy::Kv => self.query_kv(view),
            Strategy::Replay => self.query_replay(ledger, certs),
            Strategy::Snapshot => self.query_snapshot(ledger, certs, snapshots),
        }
    }

    /// Scan the live table, checking every entry against the window
    pub fn query_kv<V: HistoryView>(&self, view: &V) -> Result<QueryOutcome> {
        tracing::info!(from = %self.from, to = %self.to, "History query via KV view");

        let mut results = Vec::new();
        let mut failure = None;

        view.for_each(&mut |_, entry| {
            let date = match parse_date(&entry.date) {
                Ok(date) => date,
                Err(e) => {
                    failure = Some(e);
                    return false;
                }
            };
            if date >= self.from && date <= self.to {
                results.push(entry.c_id);
            }
            true
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(QueryOutcome {
                customer_ids: results,
                frames_read: 0,
            }),
        }
    }

    /// Replay the whole ledger with verification
    pub fn query_replay<C: NodeCertLookup>(
        &self,
        ledger: &Ledger,
        certs: &C,
    ) -> Result<QueryOutcome> {
        tracing::info!(from = %self.from, to = %self.to, "History query via verified replay");

        let mut reader = VerifiedReader::with_max_history_len(ledger, certs, self.max_history_len);
        let mut results = Vec::new();
        self.replay_loop(&mut reader, &mut results)?;

        Ok(QueryOutcome {
            customer_ids: results,
            frames_read: reader.frames_read(),
        })
    }

    /// Replay from the best snapshot at or before the window
    pub fn query_snapshot<C: NodeCertLookup>(
        &self,
        ledger: &Ledger,
        certs: &C,
        snapshots: &SnapshotIndex,
    ) -> Result<QueryOutcome> {
        tracing::info!(from = %self.from, to = %self.to, "History query via snapshot");

        let snapshot = match self.select_resume_snapshot(snapshots) {
            Ok(snapshot) => snapshot,
            Err(Error::RangePrecedesSnapshots) => {
                tracing::info!(from = %self.from, "Range precedes all snapshots");
                return Ok(QueryOutcome {
                    customer_ids: Vec::new(),
                    frames_read: 0,
                });
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(
            version = snapshot.version,
            ledger_offset = snapshot.ledger_offset,
            "Resuming from snapshot"
        );

        let mut results = Vec::new();

        let snap_reader = SnapshotReader::open(&snapshot)?;
        for entry in snap_reader
            .get_table::<HistoryId, History>(HISTORIES_TABLE)?
            .values()
        {
            let date = parse_date(&entry.date)?;
            if date >= self.from && date <= self.to {
                results.push(entry.c_id);
            }
        }

        let mut reader = VerifiedReader::resume_with_max_history_len(
            ledger,
            certs,
            snapshot.ledger_offset,
            &snapshot.merkle_witness_path,
            self.max_history_len,
        )?;
        self.replay_loop(&mut reader, &mut results)?;

        Ok(QueryOutcome {
            customer_ids: results,
            frames_read: reader.frames_read(),
        })
    }

    /// The largest snapshot with `index_value < from`, or the first snapshot
    /// when the window overlaps the registered range from the left
    fn select_resume_snapshot(&self, snapshots: &SnapshotIndex) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = snapshots.before(self.from) {
            return Ok(snapshot);
        }

        // Nothing strictly before `from`: if nothing lies before `to`
        // either, the whole range precedes every snapshot
        if snapshots.before(self.to).is_none() {
            return Err(Error::RangePrecedesSnapshots);
        }

        snapshots.first().ok_or(Error::RangePrecedesSnapshots)
    }

    /// Drain verified batches until the window is exceeded or the ledger
    /// ends
    fn replay_loop<C: NodeCertLookup>(
        &self,
        reader: &mut VerifiedReader<'_, C>,
        results: &mut Vec<u64>,
    ) -> Result<()> {
        'batches: while let Some(batch) = reader.read_batch()? {
            for domain in &batch.domains {
                if self.process_domain(domain, results)? {
                    break 'batches;
                }
            }
        }
        Ok(())
    }

    /// Collect in-window entries from one domain
    ///
    /// Returns `Ok(true)` once an entry dated past `to` is seen; entries
    /// within a domain are visited in history-id order, so nothing after it
    /// can match.
    fn process_domain(&self, domain: &Domain<'_>, results: &mut Vec<u64>) -> Result<bool> {
        if !domain.has_table(HISTORIES_TABLE) {
            return Ok(false);
        }

        let updates = domain.get_table_updates::<HistoryId, History>(HISTORIES_TABLE)?;
        for entry in updates.values() {
            let date = parse_date(&entry.date)?;
            if date >= self.from {
                if date <= self.to {
                    results.push(entry.c_id);
                } else {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }
}
