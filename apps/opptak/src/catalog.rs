//! # Catalog Import
//!
//! Loads requirements, qualifying subject codes, applicants and pathways
//! from a JSON document into a session.
//!
//! ```json
//! {
//!   "requirements": [
//!     {"id": 1, "name": "Generell studiekompetanse", "kind": "general-study-eligibility"},
//!     {"id": 2, "name": "Matematikk R1", "kind": {"subject-grade": {"minGrade": 4}}},
//!     {"id": 3, "name": "23 år", "kind": {"minimum-age": {"years": 23}}}
//!   ],
//!   "qualifyingCodes": [{"requirementId": 2, "codes": ["REA3022"]}],
//!   "applicants": [
//!     {"applicant": {"id": 7, "name": "Kari", "birthDate": "2000-03-01"},
//!      "documents": [{"kind": "vitnemal", "subjectRecords": []}]}
//!   ],
//!   "pathways": [
//!     {"id": 1, "name": "Ordinær", "description": "",
//!      "rule": {"type": "REQUIREMENT", "requirementId": 1}}
//!   ]
//! }
//! ```
//!
//! Entries are applied in dependency order: requirements, codes,
//! applicants, pathways, then pathway rules.

use opptak_core::{
    AdmissionPathway, ApplicantRecord, OpptakError, PathwayId, Requirement, RequirementId,
    RuleExpression, Session,
};
use serde::{Deserialize, Serialize};

/// Qualifying subject codes of one requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualifyingCodes {
    pub requirement_id: RequirementId,
    pub codes: Vec<String>,
}

/// A pathway together with its optional rule tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathwayEntry {
    pub id: PathwayId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rule: Option<RuleExpression>,
}

/// A catalog import document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub qualifying_codes: Vec<QualifyingCodes>,
    #[serde(default)]
    pub applicants: Vec<ApplicantRecord>,
    #[serde(default)]
    pub pathways: Vec<PathwayEntry>,
}

/// Counts of what an import wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub requirements: usize,
    pub qualifying_code_sets: usize,
    pub applicants: usize,
    pub pathways: usize,
    pub rules: usize,
}

impl Catalog {
    /// Parse a catalog from JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Self, OpptakError> {
        serde_json::from_slice(data)
            .map_err(|e| OpptakError::DeserializationError(format!("Invalid catalog: {}", e)))
    }

    /// Write every entry into the session.
    ///
    /// Re-importing a pathway keeps the pathway and replaces its rule tree.
    pub fn apply(self, session: &mut Session) -> Result<ImportSummary, OpptakError> {
        let mut summary = ImportSummary::default();

        for requirement in self.requirements {
            session.put_requirement(requirement)?;
            summary.requirements += 1;
        }

        for entry in self.qualifying_codes {
            session.put_qualifying_codes(entry.requirement_id, entry.codes)?;
            summary.qualifying_code_sets += 1;
        }

        for record in self.applicants {
            session.put_applicant(record)?;
            summary.applicants += 1;
        }

        for entry in self.pathways {
            session.put_pathway(AdmissionPathway {
                id: entry.id,
                name: entry.name,
                description: entry.description,
                rule_root: None,
            })?;
            summary.pathways += 1;

            if let Some(rule) = entry.rule {
                session.replace_pathway_rule(entry.id, Some(&rule))?;
                summary.rules += 1;
            }
        }

        tracing::info!(
            "Catalog imported: {} requirements, {} applicants, {} pathways, {} rules",
            summary.requirements,
            summary.applicants,
            summary.pathways,
            summary.rules
        );
        Ok(summary)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use opptak_core::{ApplicantId, RequirementKind};

    const CATALOG: &str = r#"{
        "requirements": [
            {"id": 1, "name": "Generell studiekompetanse", "kind": "general-study-eligibility"},
            {"id": 2, "name": "Matematikk R1", "kind": {"subject-grade": {"minGrade": 4}}},
            {"id": 3, "name": "23 år", "kind": {"minimum-age": {"years": 23}}}
        ],
        "qualifyingCodes": [{"requirementId": 2, "codes": ["REA3022"]}],
        "applicants": [
            {"applicant": {"id": 7, "name": "Kari", "birthDate": "2000-03-01"},
             "documents": [{"kind": "vitnemal", "subjectRecords": [
                {"code": "REA3022", "name": "Matematikk R1", "grade": "5", "gradingSystem": "1-6"}
             ]}]}
        ],
        "pathways": [
            {"id": 1, "name": "Ordinær",
             "rule": {"type": "GROUP", "operator": "AND", "children": [
                {"type": "REQUIREMENT", "requirementId": 1},
                {"type": "REQUIREMENT", "requirementId": 2}
             ]}},
            {"id": 2, "name": "Realkompetanse", "description": "Uten regel"}
        ]
    }"#;

    #[test]
    fn parses_every_section() {
        let catalog = Catalog::from_json(CATALOG.as_bytes()).expect("parse");
        assert_eq!(catalog.requirements.len(), 3);
        assert_eq!(
            catalog.requirements[2].kind,
            RequirementKind::MinimumAge { years: 23 }
        );
        assert_eq!(catalog.qualifying_codes[0].codes, vec!["REA3022"]);
        assert!(catalog.pathways[1].rule.is_none());
    }

    #[test]
    fn nested_records_use_camel_case_keys() {
        let catalog = Catalog::from_json(CATALOG.as_bytes()).expect("parse");
        assert_eq!(
            catalog.requirements[1].kind,
            RequirementKind::SubjectGrade { min_grade: Some(4) }
        );

        let record = &catalog.applicants[0];
        let subjects = &record.documents[0].subject_records;
        assert!(record.applicant.birth_date.is_some());
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].grading_system, "1-6");
    }

    #[test]
    fn import_summary_serializes_camel_case() {
        let json = serde_json::to_value(ImportSummary::default()).expect("serialize");
        assert!(json.get("qualifyingCodeSets").is_some());
    }

    #[test]
    fn apply_wires_pathway_rules() {
        let mut session = Session::new();
        let summary = Catalog::from_json(CATALOG.as_bytes())
            .expect("parse")
            .apply(&mut session)
            .expect("apply");

        assert_eq!(summary.requirements, 3);
        assert_eq!(summary.pathways, 2);
        assert_eq!(summary.rules, 1);
        assert_eq!(session.rule_node_count().expect("count"), 3);

        let results = session
            .evaluate_applicant(ApplicantId(7))
            .expect("evaluate")
            .expect("known applicant");
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.satisfied));
    }

    #[test]
    fn reimport_replaces_rule_without_orphans() {
        let mut session = Session::new();
        for _ in 0..2 {
            Catalog::from_json(CATALOG.as_bytes())
                .expect("parse")
                .apply(&mut session)
                .expect("apply");
        }
        assert_eq!(session.rule_node_count().expect("count"), 3);
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            Catalog::from_json(b"{\"requirements\": 3}"),
            Err(OpptakError::DeserializationError(_))
        ));
    }
}
