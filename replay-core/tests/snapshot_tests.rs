//! Snapshot writer/reader behavior over real ledger fixtures

mod common;

use common::*;
use replay_core::types::{History, HISTORIES_TABLE, SIGNATURES_TABLE};
use replay_core::{Error, SnapshotReader, VerifiedReader};

#[test]
fn test_snapshot_digest_idempotence() {
    let fixture = sorted_fixture(10, 5);
    let dir = tempfile::tempdir().unwrap();

    let snapshot = snapshot_prefix(&fixture.ledger, dir.path(), 2);

    // Opening recomputes the digest; success means file and record agree
    let reader = SnapshotReader::open(&snapshot).unwrap();
    assert_eq!(
        reader.table_names(),
        vec![SIGNATURES_TABLE, HISTORIES_TABLE]
    );

    // Opening twice is fine; the file is immutable
    SnapshotReader::open(&snapshot).unwrap();
}

#[test]
fn test_snapshot_tamper_detected() {
    let fixture = sorted_fixture(10, 5);
    let dir = tempfile::tempdir().unwrap();

    let snapshot = snapshot_prefix(&fixture.ledger, dir.path(), 2);

    let mut bytes = std::fs::read(&snapshot.file_path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x01;
    std::fs::write(&snapshot.file_path, &bytes).unwrap();

    let err = SnapshotReader::open(&snapshot).unwrap_err();
    assert!(matches!(err, Error::SnapshotCorrupt(_)));
}

#[test]
fn test_snapshot_matches_live_view() {
    let fixture = sorted_fixture(25, 5);
    let dir = tempfile::tempdir().unwrap();

    let snapshot = snapshot_prefix(&fixture.ledger, dir.path(), 5);
    let reader = SnapshotReader::open(&snapshot).unwrap();

    let table = reader.get_table::<u64, History>(HISTORIES_TABLE).unwrap();
    assert_eq!(table, fixture.view);
}

#[test]
fn test_last_write_wins_through_pipeline() {
    let mut builder = LedgerBuilder::new();
    builder.append_writes(
        "items",
        &[(1, pack(&"first")), (2, pack(&"kept"))],
        &[],
    );
    builder.append_writes("items", &[(1, pack(&"second"))], &[]);
    builder.append_writes("items", &[], &[2]);
    builder.append_history(1, &history(7, &date_at(1)));
    builder.sign_batch();

    let ledger = builder.ledger();
    let dir = tempfile::tempdir().unwrap();
    let snapshot = snapshot_prefix(&ledger, dir.path(), 1);

    let reader = SnapshotReader::open(&snapshot).unwrap();
    let items = reader.get_table::<u64, String>("items").unwrap();

    // Key 1 keeps its newest value; key 2's newest action is a remove
    assert_eq!(items.len(), 1);
    assert_eq!(items[&1], "second");

    assert_eq!(snapshot.index_value, Some(tp(&date_at(1))));
}

#[test]
fn test_witness_resume_continues_verification() {
    let fixture = sorted_fixture(40, 10);
    let dir = tempfile::tempdir().unwrap();

    let snapshot = snapshot_prefix(&fixture.ledger, dir.path(), 2);

    let mut reader = VerifiedReader::resume(
        &fixture.ledger,
        &fixture.certs,
        snapshot.ledger_offset,
        &snapshot.merkle_witness_path,
    )
    .unwrap();

    // Two signed batches remain past the snapshot, and both must verify
    let mut batches = 0;
    while let Some(batch) = reader.read_batch().unwrap() {
        batches += 1;
        assert!(batch.domains.last().unwrap().is_signature());
    }
    assert_eq!(batches, 2);
    assert_eq!(reader.frames_read(), 22);
}

#[test]
fn test_snapshot_ledger_offset_is_resume_point() {
    let fixture = sorted_fixture(20, 10);
    let dir = tempfile::tempdir().unwrap();

    let snapshot = snapshot_prefix(&fixture.ledger, dir.path(), 1);

    // The offset must sit exactly on the frame boundary after the first
    // signature frame
    let mut cursor = fixture.ledger.begin();
    let mut boundary = 0;
    while let Some(frame) = cursor.advance().unwrap() {
        if frame.domain().unwrap().is_signature() {
            boundary = frame.next_offset();
            break;
        }
    }
    assert_eq!(snapshot.ledger_offset, boundary);
}
