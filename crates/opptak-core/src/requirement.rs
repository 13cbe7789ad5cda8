//! # Requirement Evaluator
//!
//! Decides a single atomic requirement against an applicant profile.
//!
//! Dispatch is by `RequirementKind`: general study eligibility and minimum
//! age have bespoke checks, subject requirements go through the catalog's
//! qualifying subject codes.

use crate::config::EngineConfig;
use crate::graph::RuleStore;
use crate::profile::ApplicantProfile;
use crate::{EvaluationResult, OpptakError, Requirement, RequirementKind, SubjectRecord};

/// Evaluates catalog requirements against a profile.
#[derive(Debug)]
pub struct RequirementEvaluator<'a, S: RuleStore + ?Sized> {
    store: &'a S,
    config: &'a EngineConfig,
}

impl<'a, S: RuleStore + ?Sized> RequirementEvaluator<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, config: &'a EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn evaluate(
        &self,
        profile: &ApplicantProfile,
        requirement: &Requirement,
    ) -> Result<EvaluationResult, OpptakError> {
        let result = match &requirement.kind {
            RequirementKind::GeneralStudyEligibility => {
                self.general_study_eligibility(profile, requirement)
            }
            RequirementKind::MinimumAge { years } => minimum_age(profile, requirement, *years),
            RequirementKind::SubjectGrade { min_grade } => {
                self.subject_grade(profile, requirement, *min_grade)?
            }
        };
        tracing::trace!("Requirement {}: {}", requirement.id, result.satisfied);
        Ok(result)
    }

    fn general_study_eligibility(
        &self,
        profile: &ApplicantProfile,
        requirement: &Requirement,
    ) -> EvaluationResult {
        let name = &requirement.name;
        let kind = self.config.diploma_document_type.as_str();
        let records = profile
            .documents_of_kind(kind)
            .map(|document| document.subject_records.len())
            .max()
            .unwrap_or(0);

        if records > 0 {
            EvaluationResult::satisfied_by(
                name,
                format!("{name}: {kind} with {records} subject records"),
            )
        } else {
            EvaluationResult::unsatisfied(
                format!("{name}: no {kind} with subject records"),
                Vec::new(),
            )
        }
    }

    fn subject_grade(
        &self,
        profile: &ApplicantProfile,
        requirement: &Requirement,
        min_grade: Option<u8>,
    ) -> Result<EvaluationResult, OpptakError> {
        let codes = self.store.qualifying_subject_codes(requirement.id)?;
        if codes.is_empty() {
            return Ok(EvaluationResult::unsatisfied(
                format!("{}: no qualifying subject codes defined", requirement.name),
                Vec::new(),
            ));
        }

        let qualifies = |record: &SubjectRecord| {
            codes.contains(&record.code)
                && min_grade.is_none_or(|min| record.numeric_grade().is_some_and(|g| g >= min))
        };

        match profile.subject_records().find(|record| qualifies(record)) {
            Some(record) => Ok(EvaluationResult::satisfied_by(
                &requirement.name,
                format!(
                    "{}: has {} ({}) with grade {}",
                    requirement.name, record.code, record.name, record.grade
                ),
            )),
            None => {
                let rationale = match min_grade {
                    Some(min) => format!(
                        "{}: none of {} with grade {min} or better",
                        requirement.name,
                        codes.join(", ")
                    ),
                    None => format!("{}: none of {}", requirement.name, codes.join(", ")),
                };
                Ok(EvaluationResult::unsatisfied(rationale, codes))
            }
        }
    }
}

fn minimum_age(
    profile: &ApplicantProfile,
    requirement: &Requirement,
    years: u8,
) -> EvaluationResult {
    match profile.age {
        Some(age) if age >= u32::from(years) => EvaluationResult::satisfied_by(
            &requirement.name,
            format!("{}: age {age}, at least {years}", requirement.name),
        ),
        Some(age) => EvaluationResult::unsatisfied(
            format!("{}: age {age}, below {years}", requirement.name),
            Vec::new(),
        ),
        None => EvaluationResult::unsatisfied(
            format!("{}: birth date unknown", requirement.name),
            Vec::new(),
        ),
    }
}
