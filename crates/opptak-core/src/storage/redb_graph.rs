//! # redb-backed Rule Store
//!
//! A disk-backed rule store using the redb embedded database.
//!
//! Every tree-shaped write (`commit_tree`, `delete_subtree`,
//! `replace_pathway_rule`) runs inside one redb write transaction, so a
//! failure at any point leaves no partial tree behind.
//!
//! ## Integration with Session
//!
//! `RedbGraph` is the persistent storage backend for opptak sessions.
//! Unlike the in-memory `Graph`, it persists data to disk on every write.

use crate::graph::{NodeLinks, RuleStore, RuleTreeBatch};
use crate::{
    AdmissionPathway, ApplicantId, ApplicantRecord, OpptakError, PathwayId, Requirement,
    RequirementId, RuleNode, RuleNodeId,
};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, VecDeque};
use std::path::Path;

/// Table for rule nodes: RuleNodeId(u64) -> serialized RuleNode bytes
const RULE_NODES: TableDefinition<u64, &[u8]> = TableDefinition::new("rule_nodes");

/// Table for child links: (parent_id, position) -> child_id
const CHILD_LINKS: TableDefinition<(u64, u64), u64> = TableDefinition::new("child_links");

/// Reverse index of child links: child_id -> (parent_id, position)
const PARENT_LINKS: TableDefinition<u64, (u64, u64)> = TableDefinition::new("parent_links");

/// Table for direct requirement links: (node_id, position) -> requirement_id
const REQUIREMENT_LINKS: TableDefinition<(u64, u64), u64> =
    TableDefinition::new("requirement_links");

/// Requirement catalog: RequirementId(u64) -> serialized Requirement
const REQUIREMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("requirements");

/// Qualifying subject codes: RequirementId(u64) -> serialized Vec<String>
const QUALIFYING_CODES: TableDefinition<u64, &[u8]> = TableDefinition::new("qualifying_codes");

/// Applicants with documents: ApplicantId(u64) -> serialized ApplicantRecord
const APPLICANTS: TableDefinition<u64, &[u8]> = TableDefinition::new("applicants");

/// Pathways: PathwayId(u64) -> serialized AdmissionPathway
const PATHWAYS: TableDefinition<u64, &[u8]> = TableDefinition::new("pathways");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, OpptakError> {
    postcard::to_allocvec(value).map_err(|e| OpptakError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, OpptakError> {
    postcard::from_bytes(bytes).map_err(|e| OpptakError::DeserializationError(e.to_string()))
}

/// A disk-backed rule store using redb.
pub struct RedbGraph {
    /// The redb database handle.
    db: Database,
    /// Next available rule node ID.
    next_node_id: u64,
}

impl std::fmt::Debug for RedbGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbGraph")
            .field("next_node_id", &self.next_node_id)
            .finish_non_exhaustive()
    }
}

impl RedbGraph {
    /// Open or create a rule store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpptakError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| OpptakError::IoError(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(RULE_NODES)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(CHILD_LINKS)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(PARENT_LINKS)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(REQUIREMENT_LINKS)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(REQUIREMENTS)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(QUALIFYING_CODES)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(APPLICANTS)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(PATHWAYS)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(METADATA)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
        }

        // Load metadata
        let read_txn = db
            .begin_read()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;

        let next_node_id = {
            let table = read_txn
                .open_table(METADATA)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            table
                .get("next_node_id")
                .map_err(|e| OpptakError::IoError(e.to_string()))?
                .map(|v| v.value())
                .unwrap_or(0)
        };

        Ok(Self { db, next_node_id })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), OpptakError> {
        self.db
            .compact()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Get the next rule node id that would be assigned.
    #[must_use]
    pub fn next_node_id(&self) -> u64 {
        self.next_node_id
    }

    /// Insert or replace one serialized record in a single-table transaction.
    fn put_record<T: Serialize>(
        &mut self,
        table: TableDefinition<u64, &[u8]>,
        key: u64,
        value: &T,
    ) -> Result<(), OpptakError> {
        let bytes = encode(value)?;
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        {
            let mut records = write_txn
                .open_table(table)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            records
                .insert(key, bytes.as_slice())
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        Ok(())
    }

    fn get_record<T: DeserializeOwned>(
        &self,
        table: TableDefinition<u64, &[u8]>,
        key: u64,
    ) -> Result<Option<T>, OpptakError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        let records = read_txn
            .open_table(table)
            .map_err(|e| OpptakError::IoError(e.to_string()))?;

        match records
            .get(key)
            .map_err(|e| OpptakError::IoError(e.to_string()))?
        {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    fn all_records<T: DeserializeOwned>(
        &self,
        table: TableDefinition<u64, &[u8]>,
    ) -> Result<Vec<T>, OpptakError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        let records = read_txn
            .open_table(table)
            .map_err(|e| OpptakError::IoError(e.to_string()))?;

        let mut result = Vec::new();
        for entry in records
            .iter()
            .map_err(|e| OpptakError::IoError(e.to_string()))?
        {
            let (_, value) = entry.map_err(|e| OpptakError::IoError(e.to_string()))?;
            result.push(decode(value.value())?);
        }
        Ok(result)
    }
}

// =============================================================================
// TRANSACTION HELPERS
// =============================================================================

/// Write every node and link of a batch inside `txn`.
///
/// Returns the next free node id. Fails with `RequirementNotFound` before
/// writing anything if the batch references an unknown requirement.
fn insert_batch(
    txn: &WriteTransaction,
    batch: &RuleTreeBatch,
    base: u64,
) -> Result<u64, OpptakError> {
    {
        let requirements = txn
            .open_table(REQUIREMENTS)
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        for id in batch.requirement_ids() {
            let known = requirements
                .get(id.0)
                .map_err(|e| OpptakError::IoError(e.to_string()))?
                .is_some();
            if !known {
                return Err(OpptakError::RequirementNotFound(id));
            }
        }
    }

    let id_of = |index: usize| base.saturating_add(index as u64);

    let mut nodes_table = txn
        .open_table(RULE_NODES)
        .map_err(|e| OpptakError::IoError(e.to_string()))?;
    let mut children_table = txn
        .open_table(CHILD_LINKS)
        .map_err(|e| OpptakError::IoError(e.to_string()))?;
    let mut parents_table = txn
        .open_table(PARENT_LINKS)
        .map_err(|e| OpptakError::IoError(e.to_string()))?;
    let mut req_links_table = txn
        .open_table(REQUIREMENT_LINKS)
        .map_err(|e| OpptakError::IoError(e.to_string()))?;
    let mut meta_table = txn
        .open_table(METADATA)
        .map_err(|e| OpptakError::IoError(e.to_string()))?;

    for (index, pending) in batch.nodes().iter().enumerate() {
        let id = id_of(index);
        let node = RuleNode {
            id: RuleNodeId(id),
            name: pending.name.clone(),
            combinator: pending.combinator,
        };
        let node_bytes = encode(&node)?;
        nodes_table
            .insert(id, node_bytes.as_slice())
            .map_err(|e| OpptakError::IoError(e.to_string()))?;

        for (position, requirement) in pending.requirements.iter().enumerate() {
            req_links_table
                .insert((id, position as u64), requirement.0)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
        }
        for (position, &child) in pending.children.iter().enumerate() {
            let child_id = id_of(child);
            children_table
                .insert((id, position as u64), child_id)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            parents_table
                .insert(child_id, (id, position as u64))
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
        }
    }

    let next = base.saturating_add(batch.len() as u64);
    meta_table
        .insert("next_node_id", next)
        .map_err(|e| OpptakError::IoError(e.to_string()))?;
    Ok(next)
}

/// Ids of `root` and every node reachable from it, breadth-first.
fn subtree_ids(txn: &WriteTransaction, root: u64) -> Result<Vec<u64>, OpptakError> {
    let nodes_table = txn
        .open_table(RULE_NODES)
        .map_err(|e| OpptakError::IoError(e.to_string()))?;
    if nodes_table
        .get(root)
        .map_err(|e| OpptakError::IoError(e.to_string()))?
        .is_none()
    {
        return Ok(Vec::new());
    }

    let children_table = txn
        .open_table(CHILD_LINKS)
        .map_err(|e| OpptakError::IoError(e.to_string()))?;

    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::new();
    let mut order = Vec::new();

    queue.push_back(root);
    visited.insert(root);

    while let Some(current) = queue.pop_front() {
        order.push(current);
        for entry in children_table
            .range((current, 0u64)..=(current, u64::MAX))
            .map_err(|e| OpptakError::IoError(e.to_string()))?
        {
            let (_, child) = entry.map_err(|e| OpptakError::IoError(e.to_string()))?;
            let child = child.value();
            if visited.insert(child) {
                queue.push_back(child);
            }
        }
    }
    Ok(order)
}

/// Remove collected subtree nodes with all their links inside `txn`, and
/// detach pathways whose root was among them.
fn remove_nodes(txn: &WriteTransaction, ids: &[u64]) -> Result<(), OpptakError> {
    let doomed: BTreeSet<u64> = ids.iter().copied().collect();

    {
        let mut nodes_table = txn
            .open_table(RULE_NODES)
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        let mut children_table = txn
            .open_table(CHILD_LINKS)
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        let mut parents_table = txn
            .open_table(PARENT_LINKS)
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        let mut req_links_table = txn
            .open_table(REQUIREMENT_LINKS)
            .map_err(|e| OpptakError::IoError(e.to_string()))?;

        for &id in &doomed {
            nodes_table
                .remove(id)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;

            // Unhook from a parent that survives the delete.
            let parent = parents_table
                .remove(id)
                .map_err(|e| OpptakError::IoError(e.to_string()))?
                .map(|link| link.value());
            if let Some((parent_id, position)) = parent {
                if !doomed.contains(&parent_id) {
                    children_table
                        .remove((parent_id, position))
                        .map_err(|e| OpptakError::IoError(e.to_string()))?;
                }
            }

            let mut child_keys = Vec::new();
            for entry in children_table
                .range((id, 0u64)..=(id, u64::MAX))
                .map_err(|e| OpptakError::IoError(e.to_string()))?
            {
                let (key, _) = entry.map_err(|e| OpptakError::IoError(e.to_string()))?;
                child_keys.push(key.value());
            }
            for key in child_keys {
                children_table
                    .remove(key)
                    .map_err(|e| OpptakError::IoError(e.to_string()))?;
            }

            let mut req_keys = Vec::new();
            for entry in req_links_table
                .range((id, 0u64)..=(id, u64::MAX))
                .map_err(|e| OpptakError::IoError(e.to_string()))?
            {
                let (key, _) = entry.map_err(|e| OpptakError::IoError(e.to_string()))?;
                req_keys.push(key.value());
            }
            for key in req_keys {
                req_links_table
                    .remove(key)
                    .map_err(|e| OpptakError::IoError(e.to_string()))?;
            }
        }
    }

    let mut pathways_table = txn
        .open_table(PATHWAYS)
        .map_err(|e| OpptakError::IoError(e.to_string()))?;
    let mut detached = Vec::new();
    for entry in pathways_table
        .iter()
        .map_err(|e| OpptakError::IoError(e.to_string()))?
    {
        let (_, value) = entry.map_err(|e| OpptakError::IoError(e.to_string()))?;
        let pathway: AdmissionPathway = decode(value.value())?;
        if pathway.rule_root.is_some_and(|r| doomed.contains(&r.0)) {
            detached.push(pathway);
        }
    }
    for mut pathway in detached {
        pathway.rule_root = None;
        let bytes = encode(&pathway)?;
        pathways_table
            .insert(pathway.id.0, bytes.as_slice())
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
    }
    Ok(())
}

// =============================================================================
// RULESTORE TRAIT IMPLEMENTATION
// =============================================================================

impl RuleStore for RedbGraph {
    fn put_requirement(&mut self, requirement: Requirement) -> Result<(), OpptakError> {
        self.put_record(REQUIREMENTS, requirement.id.0, &requirement)
    }

    fn requirement(&self, id: RequirementId) -> Result<Option<Requirement>, OpptakError> {
        self.get_record(REQUIREMENTS, id.0)
    }

    fn requirements(&self) -> Result<Vec<Requirement>, OpptakError> {
        self.all_records(REQUIREMENTS)
    }

    fn put_qualifying_codes(
        &mut self,
        requirement: RequirementId,
        codes: Vec<String>,
    ) -> Result<(), OpptakError> {
        let bytes = encode(&codes)?;
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        {
            let requirements = write_txn
                .open_table(REQUIREMENTS)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            if requirements
                .get(requirement.0)
                .map_err(|e| OpptakError::IoError(e.to_string()))?
                .is_none()
            {
                return Err(OpptakError::RequirementNotFound(requirement));
            }
            let mut codes_table = write_txn
                .open_table(QUALIFYING_CODES)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            codes_table
                .insert(requirement.0, bytes.as_slice())
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        Ok(())
    }

    fn qualifying_subject_codes(
        &self,
        requirement: RequirementId,
    ) -> Result<Vec<String>, OpptakError> {
        Ok(self
            .get_record(QUALIFYING_CODES, requirement.0)?
            .unwrap_or_default())
    }

    fn put_applicant(&mut self, record: ApplicantRecord) -> Result<(), OpptakError> {
        self.put_record(APPLICANTS, record.applicant.id.0, &record)
    }

    fn applicant(&self, id: ApplicantId) -> Result<Option<ApplicantRecord>, OpptakError> {
        self.get_record(APPLICANTS, id.0)
    }

    fn put_pathway(&mut self, pathway: AdmissionPathway) -> Result<(), OpptakError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        {
            let mut pathways_table = write_txn
                .open_table(PATHWAYS)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            let rule_root = match pathways_table
                .get(pathway.id.0)
                .map_err(|e| OpptakError::IoError(e.to_string()))?
            {
                Some(data) => decode::<AdmissionPathway>(data.value())?.rule_root,
                None => None,
            };
            let bytes = encode(&AdmissionPathway {
                rule_root,
                ..pathway
            })?;
            pathways_table
                .insert(pathway.id.0, bytes.as_slice())
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        Ok(())
    }

    fn pathway(&self, id: PathwayId) -> Result<Option<AdmissionPathway>, OpptakError> {
        self.get_record(PATHWAYS, id.0)
    }

    fn pathways(&self) -> Result<Vec<AdmissionPathway>, OpptakError> {
        self.all_records(PATHWAYS)
    }

    fn commit_tree(&mut self, batch: &RuleTreeBatch) -> Result<RuleNodeId, OpptakError> {
        // Validate before touching the database.
        batch.validate()?;

        let base = self.next_node_id;
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        let next = insert_batch(&write_txn, batch, base)?;
        write_txn
            .commit()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;

        // Update in-memory state only after successful commit.
        self.next_node_id = next;
        Ok(RuleNodeId(base))
    }

    fn delete_subtree(&mut self, root: RuleNodeId) -> Result<usize, OpptakError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        let ids = subtree_ids(&write_txn, root.0)?;
        if ids.is_empty() {
            return Ok(0);
        }
        remove_nodes(&write_txn, &ids)?;
        write_txn
            .commit()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        Ok(ids.len())
    }

    fn replace_pathway_rule(
        &mut self,
        pathway: PathwayId,
        batch: Option<&RuleTreeBatch>,
    ) -> Result<Option<RuleNodeId>, OpptakError> {
        if let Some(batch) = batch {
            batch.validate()?;
        }

        let base = self.next_node_id;
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;

        let current: AdmissionPathway = {
            let pathways_table = write_txn
                .open_table(PATHWAYS)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            let data = pathways_table
                .get(pathway.0)
                .map_err(|e| OpptakError::IoError(e.to_string()))?
                .ok_or(OpptakError::PathwayNotFound(pathway))?;
            decode(data.value())?
        };

        if let Some(old_root) = current.rule_root {
            let ids = subtree_ids(&write_txn, old_root.0)?;
            remove_nodes(&write_txn, &ids)?;
        }

        let (new_root, next) = match batch {
            Some(batch) => {
                let next = insert_batch(&write_txn, batch, base)?;
                (Some(RuleNodeId(base)), next)
            }
            None => (None, base),
        };

        {
            let mut pathways_table = write_txn
                .open_table(PATHWAYS)
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
            let bytes = encode(&AdmissionPathway {
                rule_root: new_root,
                ..current
            })?;
            pathways_table
                .insert(pathway.0, bytes.as_slice())
                .map_err(|e| OpptakError::IoError(e.to_string()))?;
        }

        write_txn
            .commit()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;

        self.next_node_id = next;
        Ok(new_root)
    }

    fn rule_node(&self, id: RuleNodeId) -> Result<Option<RuleNode>, OpptakError> {
        self.get_record(RULE_NODES, id.0)
    }

    fn node_links(&self, id: RuleNodeId) -> Result<Option<NodeLinks>, OpptakError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        let nodes_table = read_txn
            .open_table(RULE_NODES)
            .map_err(|e| OpptakError::IoError(e.to_string()))?;

        let node: RuleNode = match nodes_table
            .get(id.0)
            .map_err(|e| OpptakError::IoError(e.to_string()))?
        {
            Some(data) => decode(data.value())?,
            None => return Ok(None),
        };

        let req_links_table = read_txn
            .open_table(REQUIREMENT_LINKS)
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        let requirements_table = read_txn
            .open_table(REQUIREMENTS)
            .map_err(|e| OpptakError::IoError(e.to_string()))?;

        let mut requirements = Vec::new();
        for entry in req_links_table
            .range((id.0, 0u64)..=(id.0, u64::MAX))
            .map_err(|e| OpptakError::IoError(e.to_string()))?
        {
            let (_, requirement_id) = entry.map_err(|e| OpptakError::IoError(e.to_string()))?;
            if let Some(data) = requirements_table
                .get(requirement_id.value())
                .map_err(|e| OpptakError::IoError(e.to_string()))?
            {
                requirements.push(decode(data.value())?);
            } else {
                tracing::warn!(
                    "Node {} links unknown requirement {}",
                    id,
                    requirement_id.value()
                );
            }
        }

        let children_table = read_txn
            .open_table(CHILD_LINKS)
            .map_err(|e| OpptakError::IoError(e.to_string()))?;

        let mut children = Vec::new();
        for entry in children_table
            .range((id.0, 0u64)..=(id.0, u64::MAX))
            .map_err(|e| OpptakError::IoError(e.to_string()))?
        {
            let (_, child_id) = entry.map_err(|e| OpptakError::IoError(e.to_string()))?;
            if let Some(data) = nodes_table
                .get(child_id.value())
                .map_err(|e| OpptakError::IoError(e.to_string()))?
            {
                children.push(decode(data.value())?);
            } else {
                tracing::warn!("Node {} links unknown child {}", id, child_id.value());
            }
        }

        Ok(Some(NodeLinks {
            node,
            requirements,
            children,
        }))
    }

    fn rule_node_count(&self) -> Result<usize, OpptakError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        let nodes_table = read_txn
            .open_table(RULE_NODES)
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        let count = nodes_table
            .len()
            .map_err(|e| OpptakError::IoError(e.to_string()))?;
        Ok(count as usize)
    }
}
