//! # opptak-core
//!
//! The admission eligibility rule engine.
//!
//! Eligibility rules are boolean trees (AND / OR / NOT) over atomic
//! requirements from a catalog. This crate persists those trees in a graph
//! store, reads them back, renders them as text, and evaluates them against
//! an applicant's documents to decide whether an admission pathway is open
//! to that applicant.
//!
//! ## Architectural Constraints
//!
//! - Synchronous, no async and no network dependencies
//! - All collections are ordered (`BTreeMap`/`BTreeSet`) for determinism
//! - Tree writes are single transactions; a failed write leaves no trace
//! - Lookups that miss return `None` or a sentinel, never an error

// =============================================================================
// MODULES
// =============================================================================

pub mod builder;
pub mod config;
pub mod evaluator;
pub mod expression;
pub mod formats;
pub mod graph;
pub mod pathway;
pub mod persister;
pub mod primitives;
pub mod profile;
pub mod renderer;
pub mod requirement;
pub mod session;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AdmissionPathway, Applicant, ApplicantId, ApplicantRecord, Combinator, Document,
    EvaluationResult, OpptakError, PathwayId, Requirement, RequirementId, RequirementKind, RuleNode,
    RuleNodeId, SubjectRecord,
};

// =============================================================================
// RE-EXPORTS: Rule Engine
// =============================================================================

pub use builder::ExpressionBuilder;
pub use config::{EngineConfig, RenderLabels};
pub use evaluator::NodeEvaluator;
pub use expression::{GroupOperator, RuleExpression};
pub use graph::{Graph, NodeLinks, RuleStore, RuleTreeBatch, SerializableGraph};
pub use pathway::{PathwayEvaluationResult, PathwayEvaluator, PathwaySummary};
pub use persister::ExpressionPersister;
pub use profile::ApplicantProfile;
pub use renderer::ExpressionRenderer;
pub use requirement::RequirementEvaluator;
pub use session::{Session, StorageBackend};
pub use storage::RedbGraph;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, graph_from_bytes, graph_to_bytes};
