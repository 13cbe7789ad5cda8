//! # Core Type Definitions
//!
//! This module contains the core types of the eligibility rule engine:
//! - Identifiers (`RuleNodeId`, `RequirementId`, `ApplicantId`, `PathwayId`)
//! - Persisted records (`RuleNode`, `Requirement`, `AdmissionPathway`, `Applicant`)
//! - Applicant evidence (`Document`, `SubjectRecord`)
//! - Output structures (`EvaluationResult`)
//! - Error types (`OpptakError`)
//!
//! ## Determinism Guarantees
//!
//! All identifiers:
//! - Are plain `u64` newtypes
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//!
//! Every record stored by a backend is encoded with postcard, so stored
//! types use externally tagged enums and never skip fields.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a persisted rule-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleNodeId(pub u64);

/// Identifier of a catalog requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequirementId(pub u64);

/// Identifier of an applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicantId(pub u64);

/// Identifier of an admission pathway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathwayId(pub u64);

macro_rules! display_id {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

display_id!(RuleNodeId, RequirementId, ApplicantId, PathwayId);

// =============================================================================
// RULE NODE
// =============================================================================

/// The combinator stored on a rule node.
///
/// Closed set: a node can never carry a tag the evaluator does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Combinator {
    And,
    Or,
    /// Negation of the conjunction of all children.
    Not,
    /// Leaf marker: the node stands for its directly linked requirement.
    Requirement,
}

impl Combinator {
    /// Canonical upper-case tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::Requirement => "REQUIREMENT",
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted node of a boolean requirement tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleNode {
    pub id: RuleNodeId,
    /// Display name, for human inspection only.
    pub name: String,
    pub combinator: Combinator,
}

// =============================================================================
// REQUIREMENT CATALOG
// =============================================================================

/// Selects the evaluation logic of a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequirementKind {
    /// Holds a diploma document with at least one subject record.
    GeneralStudyEligibility,
    /// Derived age is at least `years`.
    MinimumAge { years: u8 },
    /// Has one of the requirement's qualifying subject codes, optionally
    /// with a numeric grade of at least `min_grade`.
    SubjectGrade {
        #[serde(default, rename = "minGrade")]
        min_grade: Option<u8>,
    },
}

/// An atomic eligibility condition.
///
/// Owned by the catalog; rule trees only reference it by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub id: RequirementId,
    pub name: String,
    pub kind: RequirementKind,
}

// =============================================================================
// ADMISSION PATHWAY
// =============================================================================

/// A named route to qualification.
///
/// `rule_root` is the "has-rule" edge; `None` means no requirements are attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionPathway {
    pub id: PathwayId,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub rule_root: Option<RuleNodeId>,
}

// =============================================================================
// APPLICANT EVIDENCE
// =============================================================================

/// One graded subject on a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    pub code: String,
    pub name: String,
    /// Raw grade value as issued ("5", "B", "bestått").
    pub grade: String,
    pub grading_system: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl SubjectRecord {
    /// The grade as a number, when the grade value is numeric.
    #[must_use]
    pub fn numeric_grade(&self) -> Option<u8> {
        self.grade.trim().parse().ok()
    }
}

/// A submitted document (diploma, certificate, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document type tag, e.g. `vitnemal`.
    pub kind: String,
    #[serde(default)]
    pub subject_records: Vec<SubjectRecord>,
}

/// The person behind an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Applicant {
    pub id: ApplicantId,
    pub name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

/// An applicant together with every submitted document, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantRecord {
    pub applicant: Applicant,
    #[serde(default)]
    pub documents: Vec<Document>,
}

// =============================================================================
// EVALUATION RESULT
// =============================================================================

/// Outcome of evaluating a requirement or a rule node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub satisfied: bool,
    pub rationale: String,
    pub satisfied_requirements: Vec<String>,
    /// De-duplicated, first-seen order.
    pub missing_subject_codes: Vec<String>,
}

impl EvaluationResult {
    /// A satisfied result crediting one requirement.
    #[must_use]
    pub fn satisfied_by(requirement: &str, rationale: impl Into<String>) -> Self {
        Self {
            satisfied: true,
            rationale: rationale.into(),
            satisfied_requirements: vec![requirement.to_string()],
            missing_subject_codes: Vec::new(),
        }
    }

    /// An unsatisfied result with the codes that would have satisfied it.
    #[must_use]
    pub fn unsatisfied(rationale: impl Into<String>, missing: Vec<String>) -> Self {
        Self {
            satisfied: false,
            rationale: rationale.into(),
            satisfied_requirements: Vec::new(),
            missing_subject_codes: missing,
        }
    }

    /// Sentinel for a rule node id that does not resolve.
    #[must_use]
    pub fn node_not_found(id: RuleNodeId) -> Self {
        Self::unsatisfied(format!("rule node {id} not found"), Vec::new())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the rule engine.
///
/// - Lookups that miss are NOT errors; they surface as `None` or sentinels
/// - Use `Result<T, OpptakError>` for fallible operations
/// - The engine never panics; all errors are recoverable
#[derive(Debug, Error)]
pub enum OpptakError {
    /// A caller-supplied rule expression is malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A rule tree references a requirement missing from the catalog.
    #[error("Requirement not found: {0}")]
    RequirementNotFound(RequirementId),

    /// A write targets a pathway that does not exist.
    #[error("Pathway not found: {0}")]
    PathwayNotFound(PathwayId),

    /// Rule tree recursion went deeper than the configured bound.
    #[error("Rule tree deeper than {0} levels")]
    DepthExceeded(usize),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// The engine configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

// =============================================================================
// TESTS
// =============================================================================
