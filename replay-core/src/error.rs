//! Error types for the replay engine

use thiserror::Error;

/// Result type for replay-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Replay-engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Frame header or payload layout is invalid
    #[error("Malformed frame at offset {offset}: {reason}")]
    MalformedFrame {
        /// File offset of the frame's length prefix
        offset: u64,
        /// What was wrong with the frame
        reason: String,
    },

    /// Buffer ended in the middle of a frame
    #[error("Short read at offset {0}")]
    ShortRead(u64),

    /// Packed payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Merkle root did not match the signature embedded in the ledger
    #[error("Batch verification failed at version {0}")]
    VerificationFailed(u64),

    /// Snapshot file digest does not match the trusted content hash
    #[error("Snapshot corrupt: {0}")]
    SnapshotCorrupt(String),

    /// Signing node has no certificate in the node table
    #[error("Missing certificate for node {0}")]
    MissingNodeCert(u64),

    /// Query range lies entirely before the first registered snapshot
    #[error("Query range precedes all registered snapshots")]
    RangePrecedesSnapshots,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
