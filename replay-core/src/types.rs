//! Domain records carried by the ledger
//!
//! Records are MessagePack-encoded on the wire as positional arrays, so field
//! order here is part of the format and must not change.

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

/// Identifier of a history entry; assigned monotonically in commit order
pub type HistoryId = u64;

/// Identifier of a ledger node
pub type NodeId = u64;

/// Reserved table holding batch signatures
pub const SIGNATURES_TABLE: &str = "ccf.signatures";

/// Name of the indexed customer-history table
pub const HISTORIES_TABLE: &str = "histories";

/// One customer history entry
///
/// `date` is a `"%Y-%m-%d %H:%M:%S"` string; entries are appended to the
/// ledger in date order, which the replay strategies rely on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    /// Customer id
    pub c_id: u64,
    /// Customer district id
    pub c_d_id: u64,
    /// Customer warehouse id
    pub c_w_id: u64,
    /// District id
    pub d_id: u64,
    /// Warehouse id
    pub w_id: u64,
    /// Entry date string
    pub date: String,
    /// Payment amount
    pub amount: f64,
    /// Free-form data
    pub data: String,
}

/// Value stored in the reserved signatures table
///
/// Closes a batch: the signing node attests to the Merkle root over all
/// preceding frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    /// Node that produced the signature
    pub node: NodeId,
    /// Ed25519 signature over the Merkle root
    pub sig: ByteBuf,
}

impl SignatureRecord {
    /// Create a record from a node id and raw signature bytes
    pub fn new(node: NodeId, sig: Vec<u8>) -> Self {
        Self {
            node,
            sig: ByteBuf::from(sig),
        }
    }
}
