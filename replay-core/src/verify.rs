//! Signature-frame verification
//!
//! A signature frame carries a [`SignatureRecord`] in the reserved
//! signatures table: the signing node's id and its Ed25519 signature over
//! the current Merkle root. The node's certificate is obtained through an
//! injected lookup; certificate provisioning itself is external.

use crate::crypto;
use crate::domain::Domain;
use crate::types::{NodeId, SignatureRecord, SIGNATURES_TABLE};
use crate::{Error, Result};
use std::collections::HashMap;

/// A node's verification certificate (raw Ed25519 public key)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeCert {
    /// Ed25519 public key bytes
    pub public_key: [u8; 32],
}

impl NodeCert {
    /// Wrap raw public-key bytes
    pub fn new(public_key: [u8; 32]) -> Self {
        Self { public_key }
    }
}

/// Capability for resolving a signing node to its certificate
pub trait NodeCertLookup {
    /// Certificate of `node`, if the node is known
    fn node_cert(&self, node: NodeId) -> Option<NodeCert>;
}

impl NodeCertLookup for HashMap<NodeId, NodeCert> {
    fn node_cert(&self, node: NodeId) -> Option<NodeCert> {
        self.get(&node).copied()
    }
}

/// Verify the signature embedded in a signature frame against `root`
///
/// Does not mutate any Merkle state. A missing certificate or malformed
/// signature record is an error; a signature that simply does not match
/// returns `Ok(false)`.
pub fn verify_signature_frame<C: NodeCertLookup>(
    domain: &Domain<'_>,
    root: &[u8; 32],
    certs: &C,
) -> Result<bool> {
    let updates = domain.get_table_updates::<u64, SignatureRecord>(SIGNATURES_TABLE)?;

    // Only one signature exists per signature frame
    let record = updates
        .values()
        .next()
        .ok_or_else(|| Error::Decode("signature frame carries no signature".to_string()))?;

    let cert = certs
        .node_cert(record.node)
        .ok_or(Error::MissingNodeCert(record.node))?;

    Ok(crypto::verify_signature(root, &record.sig, &cert.public_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::domain::Domain;
    use std::collections::HashSet;

    fn signature_payload(record: &SignatureRecord) -> Vec<u8> {
        let mut out = rmp_serde::to_vec(&1u64).unwrap(); // version
        out.extend(rmp_serde::to_vec(&2u64).unwrap()); // map start marker
        out.extend(rmp_serde::to_vec(SIGNATURES_TABLE).unwrap());
        out.extend(rmp_serde::to_vec(&0u64).unwrap()); // read version
        out.extend(rmp_serde::to_vec(&0u64).unwrap()); // read count
        out.extend(rmp_serde::to_vec(&1u64).unwrap()); // write count
        out.extend(rmp_serde::to_vec(&1u64).unwrap()); // key
        out.extend(rmp_serde::to_vec(record).unwrap());
        out.extend(rmp_serde::to_vec(&0u64).unwrap()); // remove count
        out
    }

    fn interest() -> HashSet<String> {
        [SIGNATURES_TABLE.to_string()].into_iter().collect()
    }

    #[test]
    fn test_valid_signature_verifies() {
        let keypair = KeyPair::from_seed(&[9u8; 32]);
        let root = crate::crypto::hash_bytes(b"some root");

        let record = SignatureRecord::new(4, keypair.sign(&root));
        let payload = signature_payload(&record);
        let domain = Domain::decode(&payload, &interest()).unwrap();

        let mut certs = HashMap::new();
        certs.insert(4u64, NodeCert::new(keypair.public_key()));

        assert!(verify_signature_frame(&domain, &root, &certs).unwrap());
    }

    #[test]
    fn test_wrong_root_fails_verification() {
        let keypair = KeyPair::from_seed(&[9u8; 32]);
        let root = crate::crypto::hash_bytes(b"some root");
        let other_root = crate::crypto::hash_bytes(b"another root");

        let record = SignatureRecord::new(4, keypair.sign(&root));
        let payload = signature_payload(&record);
        let domain = Domain::decode(&payload, &interest()).unwrap();

        let mut certs = HashMap::new();
        certs.insert(4u64, NodeCert::new(keypair.public_key()));

        assert!(!verify_signature_frame(&domain, &other_root, &certs).unwrap());
    }

    #[test]
    fn test_missing_cert_is_fatal() {
        let keypair = KeyPair::from_seed(&[9u8; 32]);
        let root = crate::crypto::hash_bytes(b"some root");

        let record = SignatureRecord::new(4, keypair.sign(&root));
        let payload = signature_payload(&record);
        let domain = Domain::decode(&payload, &interest()).unwrap();

        let certs: HashMap<NodeId, NodeCert> = HashMap::new();
        let err = verify_signature_frame(&domain, &root, &certs).unwrap_err();
        assert!(matches!(err, Error::MissingNodeCert(4)));
    }
}
