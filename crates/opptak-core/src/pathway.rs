//! # Pathway Evaluator
//!
//! Top-level entry point: loads the applicant, evaluates and renders the
//! pathway's rule tree, and assembles the caller-facing result.

use crate::config::EngineConfig;
use crate::evaluator::NodeEvaluator;
use crate::graph::RuleStore;
use crate::profile::ApplicantProfile;
use crate::renderer::ExpressionRenderer;
use crate::{AdmissionPathway, ApplicantId, OpptakError, PathwayId};
use serde::{Deserialize, Serialize};

/// Rationale of a pathway without a rule tree.
pub const NO_REQUIREMENTS_RATIONALE: &str = "no requirements defined";

/// Pathway metadata carried in a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathwaySummary {
    pub id: PathwayId,
    pub name: String,
    pub description: String,
}

impl From<&AdmissionPathway> for PathwaySummary {
    fn from(pathway: &AdmissionPathway) -> Self {
        Self {
            id: pathway.id,
            name: pathway.name.clone(),
            description: pathway.description.clone(),
        }
    }
}

/// Outcome of evaluating one applicant against one pathway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathwayEvaluationResult {
    pub pathway: PathwaySummary,
    pub satisfied: bool,
    pub rule_text: String,
    pub rationale: String,
    pub satisfied_requirements: Vec<String>,
    pub missing_subject_codes: Vec<String>,
}

/// Evaluates applicants against admission pathways.
#[derive(Debug)]
pub struct PathwayEvaluator<'a, S: RuleStore + ?Sized> {
    store: &'a S,
    config: &'a EngineConfig,
}

impl<'a, S: RuleStore + ?Sized> PathwayEvaluator<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, config: &'a EngineConfig) -> Self {
        Self { store, config }
    }

    /// Evaluate one pathway. `None` if the applicant or pathway is unknown.
    pub fn evaluate(
        &self,
        applicant: ApplicantId,
        pathway: PathwayId,
    ) -> Result<Option<PathwayEvaluationResult>, OpptakError> {
        let Some(profile) = ApplicantProfile::load(self.store, applicant, self.config.as_of())?
        else {
            return Ok(None);
        };
        let Some(pathway) = self.store.pathway(pathway)? else {
            return Ok(None);
        };
        self.evaluate_profile(&profile, &pathway).map(Some)
    }

    /// Evaluate every pathway, in id order. `None` if the applicant is unknown.
    pub fn evaluate_all(
        &self,
        applicant: ApplicantId,
    ) -> Result<Option<Vec<PathwayEvaluationResult>>, OpptakError> {
        let Some(profile) = ApplicantProfile::load(self.store, applicant, self.config.as_of())?
        else {
            return Ok(None);
        };
        self.store
            .pathways()?
            .iter()
            .map(|pathway| self.evaluate_profile(&profile, pathway))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    fn evaluate_profile(
        &self,
        profile: &ApplicantProfile,
        pathway: &AdmissionPathway,
    ) -> Result<PathwayEvaluationResult, OpptakError> {
        let summary = PathwaySummary::from(pathway);

        let Some(root) = pathway.rule_root else {
            return Ok(PathwayEvaluationResult {
                pathway: summary,
                satisfied: true,
                rule_text: String::new(),
                rationale: NO_REQUIREMENTS_RATIONALE.to_string(),
                satisfied_requirements: Vec::new(),
                missing_subject_codes: Vec::new(),
            });
        };

        let rule_text = ExpressionRenderer::new(
            self.store,
            &self.config.labels,
            self.config.max_rule_depth,
        )
        .render(root)?;
        let result = NodeEvaluator::new(self.store, self.config).evaluate(profile, root)?;

        tracing::debug!(
            "Evaluated applicant {} on pathway {}: {}",
            profile.id, pathway.id, result.satisfied
        );

        Ok(PathwayEvaluationResult {
            pathway: summary,
            satisfied: result.satisfied,
            rule_text,
            rationale: result.rationale,
            satisfied_requirements: result.satisfied_requirements,
            missing_subject_codes: result.missing_subject_codes,
        })
    }
}
