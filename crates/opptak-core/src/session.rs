//! # Session Module
//!
//! The caller-facing API of the rule engine.
//!
//! A `Session` owns a storage backend and the engine configuration, and
//! wires the persister, builder, evaluators and renderer to them.
//!
//! ## Storage Backends
//!
//! Session supports two storage backends:
//! - `InMemory`: Uses in-memory `Graph` (fast, volatile unless explicitly saved)
//! - `Persistent`: Uses `RedbGraph` for disk-backed ACID storage

use crate::builder::ExpressionBuilder;
use crate::config::EngineConfig;
use crate::expression::RuleExpression;
use crate::graph::{Graph, RuleStore};
use crate::pathway::{PathwayEvaluationResult, PathwayEvaluator};
use crate::persister::ExpressionPersister;
use crate::renderer::ExpressionRenderer;
use crate::storage::RedbGraph;
use crate::{
    AdmissionPathway, ApplicantId, ApplicantRecord, OpptakError, PathwayId, Requirement,
    RequirementId, RuleNodeId,
};
use std::path::Path;

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory graph (fast, volatile).
    InMemory(Graph),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbGraph),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(Graph::new())
    }
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbGraph (database handle) cannot be safely cloned.

/// A Session combines a storage backend with the engine configuration.
#[derive(Debug, Default)]
pub struct Session {
    /// The storage backend (in-memory or persistent).
    backend: StorageBackend,
    config: EngineConfig,
}

impl Session {
    /// Create a new empty session with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with an existing in-memory graph.
    #[must_use]
    pub fn with_graph(graph: Graph) -> Self {
        Self {
            backend: StorageBackend::InMemory(graph),
            config: EngineConfig::default(),
        }
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path.
    /// All changes are automatically persisted to disk.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, OpptakError> {
        let redb = RedbGraph::open(path)?;
        Ok(Self {
            backend: StorageBackend::Persistent(redb),
            config: EngineConfig::default(),
        })
    }

    /// Replace the engine configuration after validating it.
    pub fn set_config(&mut self, config: EngineConfig) -> Result<(), OpptakError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// Get an optional reference to the in-memory graph.
    ///
    /// Returns `Some(&Graph)` for in-memory backends, `None` for persistent backends.
    #[must_use]
    pub fn graph_opt(&self) -> Option<&Graph> {
        match &self.backend {
            StorageBackend::InMemory(g) => Some(g),
            StorageBackend::Persistent(_) => None,
        }
    }

    fn store(&self) -> &dyn RuleStore {
        match &self.backend {
            StorageBackend::InMemory(graph) => graph,
            StorageBackend::Persistent(redb) => redb,
        }
    }

    fn store_mut(&mut self) -> &mut dyn RuleStore {
        match &mut self.backend {
            StorageBackend::InMemory(graph) => graph,
            StorageBackend::Persistent(redb) => redb,
        }
    }

    // =========================================================================
    // RULE TREES
    // =========================================================================

    /// Persist an expression as a new rule tree. Returns the top node id.
    pub fn save_logical_expression(
        &mut self,
        expression: &RuleExpression,
        label: Option<&str>,
    ) -> Result<RuleNodeId, OpptakError> {
        let max_depth = self.config.max_rule_depth;
        ExpressionPersister::new(self.store_mut(), max_depth).save(expression, label)
    }

    /// Rebuild the expression rooted at `id`. `None` if the node is unknown.
    pub fn build_logical_expression(
        &self,
        id: RuleNodeId,
    ) -> Result<Option<RuleExpression>, OpptakError> {
        ExpressionBuilder::new(self.store(), self.config.max_rule_depth).build(id)
    }

    /// Every requirement id of an expression, depth-first.
    #[must_use]
    pub fn extract_requirement_ids(expression: &RuleExpression) -> Vec<RequirementId> {
        expression.extract_requirement_ids()
    }

    /// Delete a rule tree. Returns the number of nodes removed.
    pub fn delete_logical_expression(&mut self, id: RuleNodeId) -> Result<usize, OpptakError> {
        let max_depth = self.config.max_rule_depth;
        ExpressionPersister::new(self.store_mut(), max_depth).delete(id)
    }

    /// Swap a pathway's rule tree atomically. `None` detaches it.
    pub fn replace_pathway_rule(
        &mut self,
        pathway: PathwayId,
        expression: Option<&RuleExpression>,
    ) -> Result<Option<RuleNodeId>, OpptakError> {
        let max_depth = self.config.max_rule_depth;
        ExpressionPersister::new(self.store_mut(), max_depth)
            .replace_pathway_rule(pathway, expression)
    }

    /// Infix text of a rule tree. Empty if the node is unknown.
    pub fn render_rule(&self, id: RuleNodeId) -> Result<String, OpptakError> {
        ExpressionRenderer::new(
            self.store(),
            &self.config.labels,
            self.config.max_rule_depth,
        )
        .render(id)
    }

    // =========================================================================
    // EVALUATION
    // =========================================================================

    /// Evaluate one applicant against one pathway ("opptaksvei").
    pub fn evaluate_opptaks_vei(
        &self,
        applicant: ApplicantId,
        pathway: PathwayId,
    ) -> Result<Option<PathwayEvaluationResult>, OpptakError> {
        PathwayEvaluator::new(self.store(), &self.config).evaluate(applicant, pathway)
    }

    /// Evaluate one applicant against every pathway.
    pub fn evaluate_applicant(
        &self,
        applicant: ApplicantId,
    ) -> Result<Option<Vec<PathwayEvaluationResult>>, OpptakError> {
        PathwayEvaluator::new(self.store(), &self.config).evaluate_all(applicant)
    }

    // =========================================================================
    // CATALOG
    // =========================================================================

    pub fn put_requirement(&mut self, requirement: Requirement) -> Result<(), OpptakError> {
        self.store_mut().put_requirement(requirement)
    }

    pub fn put_qualifying_codes(
        &mut self,
        requirement: RequirementId,
        codes: Vec<String>,
    ) -> Result<(), OpptakError> {
        self.store_mut().put_qualifying_codes(requirement, codes)
    }

    pub fn put_applicant(&mut self, record: ApplicantRecord) -> Result<(), OpptakError> {
        self.store_mut().put_applicant(record)
    }

    pub fn put_pathway(&mut self, pathway: AdmissionPathway) -> Result<(), OpptakError> {
        self.store_mut().put_pathway(pathway)
    }

    pub fn requirements(&self) -> Result<Vec<Requirement>, OpptakError> {
        self.store().requirements()
    }

    pub fn pathway(&self, id: PathwayId) -> Result<Option<AdmissionPathway>, OpptakError> {
        self.store().pathway(id)
    }

    pub fn pathways(&self) -> Result<Vec<AdmissionPathway>, OpptakError> {
        self.store().pathways()
    }

    // =========================================================================
    // METRICS
    // =========================================================================

    /// Total number of persisted rule nodes.
    pub fn rule_node_count(&self) -> Result<usize, OpptakError> {
        self.store().rule_node_count()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequirementKind;
    use crate::expression::GroupOperator;

    fn seeded_session() -> Session {
        let mut session = Session::new();
        session
            .put_requirement(Requirement {
                id: RequirementId(1),
                name: "R1".to_string(),
                kind: RequirementKind::SubjectGrade { min_grade: None },
            })
            .expect("put");
        session
            .put_pathway(AdmissionPathway {
                id: PathwayId(1),
                name: "Ordinær".to_string(),
                description: String::new(),
                rule_root: None,
            })
            .expect("put");
        session
    }

    #[test]
    fn save_build_render_delete() {
        let mut session = seeded_session();
        let expression = RuleExpression::group(
            GroupOperator::Or,
            vec![
                RuleExpression::requirement(RequirementId(1), "R1"),
                RuleExpression::requirement(RequirementId(1), "R1"),
            ],
        );

        let root = session
            .save_logical_expression(&expression, Some("Matte"))
            .expect("save");
        assert_eq!(
            session.build_logical_expression(root).expect("build"),
            Some(expression)
        );
        assert_eq!(session.render_rule(root).expect("render"), "R1 ELLER R1");
        assert_eq!(session.delete_logical_expression(root).expect("delete"), 3);
        assert_eq!(session.rule_node_count().expect("count"), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut session = Session::new();
        let config = EngineConfig {
            diploma_document_type: String::new(),
            ..EngineConfig::default()
        };
        assert!(session.set_config(config).is_err());
        assert_eq!(session.config(), &EngineConfig::default());
    }

    #[test]
    fn replace_pathway_rule_attaches_root() {
        let mut session = seeded_session();
        let root = session
            .replace_pathway_rule(
                PathwayId(1),
                Some(&RuleExpression::requirement(RequirementId(1), "R1")),
            )
            .expect("replace");

        assert_eq!(
            session
                .pathway(PathwayId(1))
                .expect("get")
                .and_then(|p| p.rule_root),
            root
        );
        assert!(session.graph_opt().is_some());
        assert!(!session.is_persistent());
    }
}
