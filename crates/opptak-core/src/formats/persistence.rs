//! # Snapshot Format
//!
//! Binary serialization of an in-memory `Graph`, used by the `file` backend.
//!
//! Format: Header (5 bytes) + postcard-serialized graph data.
//! - 4 bytes: Magic ("OPTK")
//! - 1 byte: Version
//!
//! Sizes and the header are checked before the payload is decoded.

use crate::{Graph, OpptakError, SerializableGraph, primitives};

/// Maximum allowed snapshot size.
///
/// Checked BEFORE attempting deserialization.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 256 * 1024 * 1024; // 256 MB

/// Header length: magic + version.
const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The header that precedes all snapshot data.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), OpptakError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(OpptakError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(OpptakError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OpptakError> {
        if bytes.len() < HEADER_SIZE {
            return Err(OpptakError::DeserializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a graph to bytes (header + payload).
pub fn graph_to_bytes(graph: &Graph) -> Result<Vec<u8>, OpptakError> {
    let header = PersistenceHeader::new();
    let serializable = SerializableGraph::from(graph);

    let payload = postcard::to_stdvec(&serializable)
        .map_err(|e| OpptakError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);

    Ok(result)
}

/// Deserialize a graph from bytes.
///
/// Rejects short, oversized or foreign data before decoding the payload.
pub fn graph_from_bytes(bytes: &[u8]) -> Result<Graph, OpptakError> {
    if bytes.len() < HEADER_SIZE {
        return Err(OpptakError::DeserializationError(format!(
            "Data too short: minimum {HEADER_SIZE} bytes required"
        )));
    }

    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(OpptakError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[HEADER_SIZE..];
    let serializable: SerializableGraph = postcard::from_bytes(payload).map_err(|e| {
        OpptakError::DeserializationError(format!("Failed to decode snapshot: {e}"))
    })?;

    Ok(Graph::from(serializable))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RuleStore, RuleTreeBatch};
    use crate::{
        AdmissionPathway, Combinator, PathwayId, Requirement, RequirementId, RequirementKind,
        RuleNodeId,
    };

    fn populated_graph() -> Graph {
        let mut graph = Graph::new();
        graph
            .put_requirement(Requirement {
                id: RequirementId(1),
                name: "Generell studiekompetanse".to_string(),
                kind: RequirementKind::GeneralStudyEligibility,
            })
            .expect("put");
        graph
            .put_pathway(AdmissionPathway {
                id: PathwayId(1),
                name: "Ordinær".to_string(),
                description: String::new(),
                rule_root: None,
            })
            .expect("put");

        let mut batch = RuleTreeBatch::new();
        let root = batch.push_node("Generell studiekompetanse", Combinator::Requirement);
        batch
            .link_requirement(root, RequirementId(1))
            .expect("link");
        graph
            .replace_pathway_rule(PathwayId(1), Some(&batch))
            .expect("replace");
        graph
    }

    #[test]
    fn header_roundtrip() {
        let header = PersistenceHeader::new();
        let bytes = header.to_bytes();
        let restored = PersistenceHeader::from_bytes(&bytes).expect("parse header");

        assert_eq!(restored.magic, *primitives::MAGIC_BYTES);
        assert_eq!(restored.version, primitives::FORMAT_VERSION);
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let graph = populated_graph();

        let bytes1 = graph_to_bytes(&graph).expect("first serialize");
        let restored = graph_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = graph_to_bytes(&restored).expect("second serialize");

        assert_eq!(
            bytes1, bytes2,
            "save -> load -> save must produce identical bytes"
        );
        assert!(
            restored
                .node_links(RuleNodeId(0))
                .expect("links")
                .is_some_and(|links| links.is_leaf())
        );
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = vec![0u8; 10];
        bytes[0..4].copy_from_slice(b"XXXX");

        assert!(graph_from_bytes(&bytes).is_err());
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = graph_to_bytes(&Graph::new()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION + 1;

        assert!(matches!(
            graph_from_bytes(&bytes),
            Err(OpptakError::DeserializationError(_))
        ));
    }

    #[test]
    fn truncated_data_rejected() {
        assert!(graph_from_bytes(b"OPT").is_err());
    }
}
