//! # Graph Store
//!
//! The store behind the rule engine.
//!
//! This module defines the `RuleStore` trait, the `RuleTreeBatch` that
//! carries one rule tree into a store in a single atomic commit, and the
//! in-memory arena implementation `Graph`.
//! All data structures use `BTreeMap` for deterministic ordering.

use crate::primitives::MAX_RULE_TREE_NODES;
use crate::{
    AdmissionPathway, ApplicantId, ApplicantRecord, Combinator, OpptakError, PathwayId, Requirement,
    RequirementId, RuleNode, RuleNodeId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// =============================================================================
// RULE TREE BATCH
// =============================================================================

/// A node waiting to be committed. Links use batch-local indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNode {
    pub name: String,
    pub combinator: Combinator,
    pub requirements: Vec<RequirementId>,
    pub children: Vec<usize>,
}

/// One rule tree, staged in memory and committed in one transaction.
///
/// Index 0 is the root. A child index is always greater than its parent's
/// and every non-root node has exactly one parent, so a batch can only
/// describe a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTreeBatch {
    nodes: Vec<PendingNode>,
    has_parent: Vec<bool>,
}

impl RuleTreeBatch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a node and return its batch index.
    pub fn push_node(&mut self, name: impl Into<String>, combinator: Combinator) -> usize {
        self.nodes.push(PendingNode {
            name: name.into(),
            combinator,
            requirements: Vec::new(),
            children: Vec::new(),
        });
        self.has_parent.push(false);
        self.nodes.len() - 1
    }

    /// Link a staged node directly to a catalog requirement.
    pub fn link_requirement(
        &mut self,
        node: usize,
        requirement: RequirementId,
    ) -> Result<(), OpptakError> {
        let pending = self.nodes.get_mut(node).ok_or_else(|| {
            OpptakError::Validation(format!("batch node {node} does not exist"))
        })?;
        pending.requirements.push(requirement);
        Ok(())
    }

    /// Link a staged parent to a staged child.
    pub fn link_child(&mut self, parent: usize, child: usize) -> Result<(), OpptakError> {
        if child <= parent || child >= self.nodes.len() {
            return Err(OpptakError::Validation(format!(
                "invalid child link {parent} -> {child}"
            )));
        }
        if self.has_parent[child] {
            return Err(OpptakError::Validation(format!(
                "batch node {child} already has a parent"
            )));
        }
        self.has_parent[child] = true;
        self.nodes[parent].children.push(child);
        Ok(())
    }

    /// Staged nodes in index order.
    #[must_use]
    pub fn nodes(&self) -> &[PendingNode] {
        &self.nodes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every requirement referenced by the batch.
    #[must_use]
    pub fn requirement_ids(&self) -> BTreeSet<RequirementId> {
        self.nodes
            .iter()
            .flat_map(|node| node.requirements.iter().copied())
            .collect()
    }

    /// Check the batch is a single, bounded tree before touching a store.
    pub fn validate(&self) -> Result<(), OpptakError> {
        if self.nodes.is_empty() {
            return Err(OpptakError::Validation("empty rule tree".to_string()));
        }
        if self.nodes.len() > MAX_RULE_TREE_NODES {
            return Err(OpptakError::Validation(format!(
                "rule tree has {} nodes, maximum is {}",
                self.nodes.len(),
                MAX_RULE_TREE_NODES
            )));
        }
        if let Some(orphan) = self.has_parent.iter().skip(1).position(|linked| !linked) {
            return Err(OpptakError::Validation(format!(
                "batch node {} is not reachable from the root",
                orphan + 1
            )));
        }
        Ok(())
    }
}

// =============================================================================
// FETCH SHAPE
// =============================================================================

/// A rule node with everything it links to directly.
///
/// This is the single fetch shape shared by builder, evaluator and renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLinks {
    pub node: RuleNode,
    /// Directly referenced requirements, in link order.
    pub requirements: Vec<Requirement>,
    /// Child nodes, in link order.
    pub children: Vec<RuleNode>,
}

impl NodeLinks {
    /// A true leaf: one requirement, no child nodes.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.requirements.len() == 1 && self.children.is_empty()
    }
}

// =============================================================================
// RULESTORE TRAIT
// =============================================================================

/// The RuleStore trait defines every operation the engine needs from a store.
///
/// Writes that touch a rule tree (`commit_tree`, `delete_subtree`,
/// `replace_pathway_rule`) are atomic: either all of their effects become
/// visible or none do.
///
/// All fallible operations return `Result<T, OpptakError>` to support both
/// in-memory and persistent storage backends uniformly. A lookup that misses
/// is `Ok(None)`, not an error.
pub trait RuleStore {
    /// Insert or replace a catalog requirement.
    fn put_requirement(&mut self, requirement: Requirement) -> Result<(), OpptakError>;

    /// Look up a catalog requirement.
    fn requirement(&self, id: RequirementId) -> Result<Option<Requirement>, OpptakError>;

    /// Every catalog requirement, in id order.
    fn requirements(&self) -> Result<Vec<Requirement>, OpptakError>;

    /// Replace the qualifying subject codes of an existing requirement.
    fn put_qualifying_codes(
        &mut self,
        requirement: RequirementId,
        codes: Vec<String>,
    ) -> Result<(), OpptakError>;

    /// Subject codes that count toward a requirement. Empty if none are known.
    fn qualifying_subject_codes(
        &self,
        requirement: RequirementId,
    ) -> Result<Vec<String>, OpptakError>;

    /// Insert or replace an applicant and all of their documents.
    fn put_applicant(&mut self, record: ApplicantRecord) -> Result<(), OpptakError>;

    /// Look up an applicant with their documents.
    fn applicant(&self, id: ApplicantId) -> Result<Option<ApplicantRecord>, OpptakError>;

    /// Insert or update pathway metadata.
    ///
    /// The stored has-rule edge is kept; `pathway.rule_root` is ignored.
    /// Use `replace_pathway_rule` to change it.
    fn put_pathway(&mut self, pathway: AdmissionPathway) -> Result<(), OpptakError>;

    /// Look up a pathway.
    fn pathway(&self, id: PathwayId) -> Result<Option<AdmissionPathway>, OpptakError>;

    /// Every pathway, in id order.
    fn pathways(&self) -> Result<Vec<AdmissionPathway>, OpptakError>;

    /// Create every node and link of a batch atomically. Returns the root id.
    fn commit_tree(&mut self, batch: &RuleTreeBatch) -> Result<RuleNodeId, OpptakError>;

    /// Delete a node and everything reachable through child links, detaching
    /// pathways that pointed into the subtree. Returns the number of nodes
    /// removed; 0 if the root does not exist.
    fn delete_subtree(&mut self, root: RuleNodeId) -> Result<usize, OpptakError>;

    /// Atomically delete a pathway's current tree, commit `batch` (if any)
    /// and attach it as the pathway's root.
    fn replace_pathway_rule(
        &mut self,
        pathway: PathwayId,
        batch: Option<&RuleTreeBatch>,
    ) -> Result<Option<RuleNodeId>, OpptakError>;

    /// Look up a single rule node.
    fn rule_node(&self, id: RuleNodeId) -> Result<Option<RuleNode>, OpptakError>;

    /// A rule node with its direct requirements and child nodes.
    fn node_links(&self, id: RuleNodeId) -> Result<Option<NodeLinks>, OpptakError>;

    /// Total number of persisted rule nodes.
    fn rule_node_count(&self) -> Result<usize, OpptakError>;
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// The in-memory store: an arena of rule nodes indexed by id, with explicit
/// ordered parent -> children index lists.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Rule node storage: RuleNodeId -> RuleNode
    rule_nodes: BTreeMap<RuleNodeId, RuleNode>,

    /// Child links: parent -> ordered children
    child_links: BTreeMap<RuleNodeId, Vec<RuleNodeId>>,

    /// Direct requirement links: node -> ordered requirements
    requirement_links: BTreeMap<RuleNodeId, Vec<RequirementId>>,

    requirements: BTreeMap<RequirementId, Requirement>,

    qualifying_codes: BTreeMap<RequirementId, Vec<String>>,

    applicants: BTreeMap<ApplicantId, ApplicantRecord>,

    pathways: BTreeMap<PathwayId, AdmissionPathway>,

    /// Next available RuleNodeId
    next_node_id: u64,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the next rule node id that would be assigned.
    #[must_use]
    pub fn next_node_id(&self) -> u64 {
        self.next_node_id
    }

    /// Ids of `root` and every node reachable from it, breadth-first.
    fn subtree_ids(&self, root: RuleNodeId) -> Vec<RuleNodeId> {
        if !self.rule_nodes.contains_key(&root) {
            return Vec::new();
        }
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        let mut order = Vec::new();

        queue.push_back(root);
        visited.insert(root);

        while let Some(current) = queue.pop_front() {
            order.push(current);
            for child in self.child_links.get(&current).into_iter().flatten() {
                if visited.insert(*child) {
                    queue.push_back(*child);
                }
            }
        }
        order
    }

    /// Reject batches that reference requirements missing from the catalog.
    fn check_batch(&self, batch: &RuleTreeBatch) -> Result<(), OpptakError> {
        batch.validate()?;
        match batch
            .requirement_ids()
            .into_iter()
            .find(|id| !self.requirements.contains_key(id))
        {
            Some(missing) => Err(OpptakError::RequirementNotFound(missing)),
            None => Ok(()),
        }
    }

    /// Apply an already-checked batch. Cannot fail.
    fn apply_batch(&mut self, batch: &RuleTreeBatch) -> RuleNodeId {
        let base = self.next_node_id;
        let id_of = |index: usize| RuleNodeId(base.saturating_add(index as u64));

        for (index, pending) in batch.nodes().iter().enumerate() {
            let id = id_of(index);
            self.rule_nodes.insert(
                id,
                RuleNode {
                    id,
                    name: pending.name.clone(),
                    combinator: pending.combinator,
                },
            );
            if !pending.requirements.is_empty() {
                self.requirement_links
                    .insert(id, pending.requirements.clone());
            }
            if !pending.children.is_empty() {
                self.child_links
                    .insert(id, pending.children.iter().map(|&c| id_of(c)).collect());
            }
        }

        self.next_node_id = base.saturating_add(batch.len() as u64);
        id_of(0)
    }

    /// Remove an already-collected subtree and detach pathways pointing into it.
    fn remove_nodes(&mut self, ids: &[RuleNodeId]) {
        let doomed: BTreeSet<RuleNodeId> = ids.iter().copied().collect();
        for id in &doomed {
            self.rule_nodes.remove(id);
            self.child_links.remove(id);
            self.requirement_links.remove(id);
        }
        // A subtree root may still be listed under a surviving parent.
        for children in self.child_links.values_mut() {
            children.retain(|child| !doomed.contains(child));
        }
        for pathway in self.pathways.values_mut() {
            if pathway.rule_root.is_some_and(|root| doomed.contains(&root)) {
                pathway.rule_root = None;
            }
        }
    }
}

impl RuleStore for Graph {
    fn put_requirement(&mut self, requirement: Requirement) -> Result<(), OpptakError> {
        self.requirements.insert(requirement.id, requirement);
        Ok(())
    }

    fn requirement(&self, id: RequirementId) -> Result<Option<Requirement>, OpptakError> {
        Ok(self.requirements.get(&id).cloned())
    }

    fn requirements(&self) -> Result<Vec<Requirement>, OpptakError> {
        Ok(self.requirements.values().cloned().collect())
    }

    fn put_qualifying_codes(
        &mut self,
        requirement: RequirementId,
        codes: Vec<String>,
    ) -> Result<(), OpptakError> {
        if !self.requirements.contains_key(&requirement) {
            return Err(OpptakError::RequirementNotFound(requirement));
        }
        self.qualifying_codes.insert(requirement, codes);
        Ok(())
    }

    fn qualifying_subject_codes(
        &self,
        requirement: RequirementId,
    ) -> Result<Vec<String>, OpptakError> {
        Ok(self
            .qualifying_codes
            .get(&requirement)
            .cloned()
            .unwrap_or_default())
    }

    fn put_applicant(&mut self, record: ApplicantRecord) -> Result<(), OpptakError> {
        self.applicants.insert(record.applicant.id, record);
        Ok(())
    }

    fn applicant(&self, id: ApplicantId) -> Result<Option<ApplicantRecord>, OpptakError> {
        Ok(self.applicants.get(&id).cloned())
    }

    fn put_pathway(&mut self, pathway: AdmissionPathway) -> Result<(), OpptakError> {
        let rule_root = self.pathways.get(&pathway.id).and_then(|p| p.rule_root);
        self.pathways.insert(
            pathway.id,
            AdmissionPathway {
                rule_root,
                ..pathway
            },
        );
        Ok(())
    }

    fn pathway(&self, id: PathwayId) -> Result<Option<AdmissionPathway>, OpptakError> {
        Ok(self.pathways.get(&id).cloned())
    }

    fn pathways(&self) -> Result<Vec<AdmissionPathway>, OpptakError> {
        Ok(self.pathways.values().cloned().collect())
    }

    fn commit_tree(&mut self, batch: &RuleTreeBatch) -> Result<RuleNodeId, OpptakError> {
        self.check_batch(batch)?;
        Ok(self.apply_batch(batch))
    }

    fn delete_subtree(&mut self, root: RuleNodeId) -> Result<usize, OpptakError> {
        let ids = self.subtree_ids(root);
        self.remove_nodes(&ids);
        Ok(ids.len())
    }

    fn replace_pathway_rule(
        &mut self,
        pathway: PathwayId,
        batch: Option<&RuleTreeBatch>,
    ) -> Result<Option<RuleNodeId>, OpptakError> {
        let current = self
            .pathways
            .get(&pathway)
            .ok_or(OpptakError::PathwayNotFound(pathway))?
            .rule_root;
        if let Some(batch) = batch {
            self.check_batch(batch)?;
        }

        // Everything below is infallible, so the replace is all-or-nothing.
        if let Some(old_root) = current {
            let ids = self.subtree_ids(old_root);
            self.remove_nodes(&ids);
        }
        let new_root = batch.map(|batch| self.apply_batch(batch));
        if let Some(entry) = self.pathways.get_mut(&pathway) {
            entry.rule_root = new_root;
        }
        Ok(new_root)
    }

    fn rule_node(&self, id: RuleNodeId) -> Result<Option<RuleNode>, OpptakError> {
        Ok(self.rule_nodes.get(&id).cloned())
    }

    fn node_links(&self, id: RuleNodeId) -> Result<Option<NodeLinks>, OpptakError> {
        let Some(node) = self.rule_nodes.get(&id) else {
            return Ok(None);
        };

        let requirements = self
            .requirement_links
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|req| {
                let found = self.requirements.get(req).cloned();
                if found.is_none() {
                    tracing::warn!("Node {} links unknown requirement {}", id, req);
                }
                found
            })
            .collect();
        let children = self
            .child_links
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|child| {
                let found = self.rule_nodes.get(child).cloned();
                if found.is_none() {
                    tracing::warn!("Node {} links unknown child {}", id, child);
                }
                found
            })
            .collect();

        Ok(Some(NodeLinks {
            node: node.clone(),
            requirements,
            children,
        }))
    }

    fn rule_node_count(&self) -> Result<usize, OpptakError> {
        Ok(self.rule_nodes.len())
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Serializable representation of the graph for snapshot files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableGraph {
    pub rule_nodes: Vec<RuleNode>,
    pub child_links: Vec<(RuleNodeId, Vec<RuleNodeId>)>,
    pub requirement_links: Vec<(RuleNodeId, Vec<RequirementId>)>,
    pub requirements: Vec<Requirement>,
    pub qualifying_codes: Vec<(RequirementId, Vec<String>)>,
    pub applicants: Vec<ApplicantRecord>,
    pub pathways: Vec<AdmissionPathway>,
    pub next_node_id: u64,
}

impl From<&Graph> for SerializableGraph {
    fn from(graph: &Graph) -> Self {
        Self {
            rule_nodes: graph.rule_nodes.values().cloned().collect(),
            child_links: graph
                .child_links
                .iter()
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
            requirement_links: graph
                .requirement_links
                .iter()
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
            requirements: graph.requirements.values().cloned().collect(),
            qualifying_codes: graph
                .qualifying_codes
                .iter()
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
            applicants: graph.applicants.values().cloned().collect(),
            pathways: graph.pathways.values().cloned().collect(),
            next_node_id: graph.next_node_id,
        }
    }
}

impl From<SerializableGraph> for Graph {
    fn from(sg: SerializableGraph) -> Self {
        let rule_nodes: BTreeMap<_, _> = sg.rule_nodes.into_iter().map(|n| (n.id, n)).collect();
        // Links to nodes missing from the snapshot are dropped.
        let child_links = sg
            .child_links
            .into_iter()
            .filter(|(parent, _)| rule_nodes.contains_key(parent))
            .map(|(parent, children)| {
                let children = children
                    .into_iter()
                    .filter(|c| rule_nodes.contains_key(c))
                    .collect();
                (parent, children)
            })
            .collect();
        let requirement_links = sg
            .requirement_links
            .into_iter()
            .filter(|(node, _)| rule_nodes.contains_key(node))
            .collect();
        let max_id = rule_nodes
            .keys()
            .next_back()
            .map_or(0, |id| id.0.saturating_add(1));

        Self {
            child_links,
            requirement_links,
            requirements: sg.requirements.into_iter().map(|r| (r.id, r)).collect(),
            qualifying_codes: sg.qualifying_codes.into_iter().collect(),
            applicants: sg
                .applicants
                .into_iter()
                .map(|a| (a.applicant.id, a))
                .collect(),
            pathways: sg.pathways.into_iter().map(|p| (p.id, p)).collect(),
            next_node_id: sg.next_node_id.max(max_id),
            rule_nodes,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequirementKind;

    fn requirement(id: u64, name: &str) -> Requirement {
        Requirement {
            id: RequirementId(id),
            name: name.to_string(),
            kind: RequirementKind::SubjectGrade { min_grade: None },
        }
    }

    fn pathway(id: u64) -> AdmissionPathway {
        AdmissionPathway {
            id: PathwayId(id),
            name: format!("Pathway {id}"),
            description: String::new(),
            rule_root: None,
        }
    }

    /// AND(leaf R1, OR(leaf R2))
    fn two_level_batch() -> RuleTreeBatch {
        let mut batch = RuleTreeBatch::new();
        let root = batch.push_node("root", Combinator::And);
        let leaf = batch.push_node("R1", Combinator::Requirement);
        batch
            .link_requirement(leaf, RequirementId(1))
            .expect("link");
        batch.link_child(root, leaf).expect("link");
        let or = batch.push_node("or", Combinator::Or);
        batch.link_child(root, or).expect("link");
        let inner = batch.push_node("R2", Combinator::Requirement);
        batch
            .link_requirement(inner, RequirementId(2))
            .expect("link");
        batch.link_child(or, inner).expect("link");
        batch
    }

    fn seeded_graph() -> Graph {
        let mut graph = Graph::new();
        graph.put_requirement(requirement(1, "R1")).expect("put");
        graph.put_requirement(requirement(2, "R2")).expect("put");
        graph.put_pathway(pathway(1)).expect("put");
        graph
    }

    #[test]
    fn batch_rejects_backward_and_double_links() {
        let mut batch = RuleTreeBatch::new();
        let a = batch.push_node("a", Combinator::And);
        let b = batch.push_node("b", Combinator::And);
        assert!(batch.link_child(b, a).is_err());
        assert!(batch.link_child(a, a).is_err());
        batch.link_child(a, b).expect("link");
        assert!(batch.link_child(a, b).is_err());
    }

    #[test]
    fn batch_rejects_unreachable_nodes() {
        let mut batch = RuleTreeBatch::new();
        batch.push_node("root", Combinator::And);
        batch.push_node("orphan", Combinator::And);
        assert!(matches!(batch.validate(), Err(OpptakError::Validation(_))));
    }

    #[test]
    fn commit_assigns_sequential_ids_and_preserves_order() {
        let mut graph = seeded_graph();
        let root = graph.commit_tree(&two_level_batch()).expect("commit");

        assert_eq!(root, RuleNodeId(0));
        assert_eq!(graph.rule_node_count().expect("count"), 4);

        let links = graph.node_links(root).expect("links").expect("exists");
        let child_ids: Vec<_> = links.children.iter().map(|c| c.id).collect();
        assert_eq!(child_ids, vec![RuleNodeId(1), RuleNodeId(2)]);
        assert!(links.requirements.is_empty());

        let leaf = graph
            .node_links(RuleNodeId(1))
            .expect("links")
            .expect("exists");
        assert!(leaf.is_leaf());
        assert_eq!(leaf.requirements[0].name, "R1");
    }

    #[test]
    fn commit_with_unknown_requirement_leaves_graph_untouched() {
        let mut graph = Graph::new();
        graph.put_requirement(requirement(1, "R1")).expect("put");

        let result = graph.commit_tree(&two_level_batch());

        assert!(matches!(
            result,
            Err(OpptakError::RequirementNotFound(RequirementId(2)))
        ));
        assert_eq!(graph.rule_node_count().expect("count"), 0);
        assert_eq!(graph.next_node_id(), 0);
    }

    #[test]
    fn delete_subtree_removes_descendants_and_is_idempotent() {
        let mut graph = seeded_graph();
        let root = graph.commit_tree(&two_level_batch()).expect("commit");

        assert_eq!(graph.delete_subtree(root).expect("delete"), 4);
        assert_eq!(graph.rule_node_count().expect("count"), 0);
        assert_eq!(graph.delete_subtree(root).expect("delete again"), 0);
    }

    #[test]
    fn delete_inner_subtree_unlinks_from_parent() {
        let mut graph = seeded_graph();
        let root = graph.commit_tree(&two_level_batch()).expect("commit");

        graph.delete_subtree(RuleNodeId(2)).expect("delete");

        let links = graph.node_links(root).expect("links").expect("exists");
        assert_eq!(links.children.len(), 1);
        assert_eq!(graph.rule_node_count().expect("count"), 2);
    }

    #[test]
    fn replace_pathway_rule_swaps_trees_without_orphans() {
        let mut graph = seeded_graph();
        let first = graph
            .replace_pathway_rule(PathwayId(1), Some(&two_level_batch()))
            .expect("replace")
            .expect("root");
        let second = graph
            .replace_pathway_rule(PathwayId(1), Some(&two_level_batch()))
            .expect("replace")
            .expect("root");

        assert_ne!(first, second);
        assert_eq!(graph.rule_node_count().expect("count"), 4);
        assert!(graph.rule_node(first).expect("lookup").is_none());
        assert_eq!(
            graph
                .pathway(PathwayId(1))
                .expect("lookup")
                .and_then(|p| p.rule_root),
            Some(second)
        );

        assert_eq!(
            graph
                .replace_pathway_rule(PathwayId(1), None)
                .expect("clear"),
            None
        );
        assert_eq!(graph.rule_node_count().expect("count"), 0);
    }

    #[test]
    fn replace_on_unknown_pathway_fails() {
        let mut graph = seeded_graph();
        let result = graph.replace_pathway_rule(PathwayId(99), Some(&two_level_batch()));
        assert!(matches!(result, Err(OpptakError::PathwayNotFound(_))));
        assert_eq!(graph.rule_node_count().expect("count"), 0);
    }

    #[test]
    fn deleting_a_root_detaches_its_pathway() {
        let mut graph = seeded_graph();
        let root = graph
            .replace_pathway_rule(PathwayId(1), Some(&two_level_batch()))
            .expect("replace")
            .expect("root");

        graph.delete_subtree(root).expect("delete");

        let stored = graph
            .pathway(PathwayId(1))
            .expect("lookup")
            .expect("exists");
        assert_eq!(stored.rule_root, None);
    }

    #[test]
    fn put_pathway_keeps_existing_rule_edge() {
        let mut graph = seeded_graph();
        let root = graph
            .replace_pathway_rule(PathwayId(1), Some(&two_level_batch()))
            .expect("replace");

        let mut renamed = pathway(1);
        renamed.name = "Renamed".to_string();
        graph.put_pathway(renamed).expect("put");

        let stored = graph
            .pathway(PathwayId(1))
            .expect("lookup")
            .expect("exists");
        assert_eq!(stored.name, "Renamed");
        assert_eq!(stored.rule_root, root);
    }

    #[test]
    fn qualifying_codes_require_known_requirement() {
        let mut graph = seeded_graph();
        graph
            .put_qualifying_codes(RequirementId(1), vec!["REA3022".to_string()])
            .expect("put");
        assert_eq!(
            graph
                .qualifying_subject_codes(RequirementId(1))
                .expect("get"),
            vec!["REA3022".to_string()]
        );
        let untouched = graph.qualifying_subject_codes(RequirementId(2));
        assert!(untouched.expect("get").is_empty());
        let unknown = graph.put_qualifying_codes(RequirementId(77), vec![]);
        assert!(unknown.is_err());
    }

    #[test]
    fn serializable_graph_roundtrip() {
        let mut graph = seeded_graph();
        graph.commit_tree(&two_level_batch()).expect("commit");

        let restored = Graph::from(SerializableGraph::from(&graph));

        assert_eq!(restored.rule_node_count().expect("count"), 4);
        assert_eq!(restored.next_node_id(), graph.next_node_id());
        assert_eq!(
            restored.node_links(RuleNodeId(0)).expect("links"),
            graph.node_links(RuleNodeId(0)).expect("links")
        );
    }
}
