//! # Node Evaluator
//!
//! Recursive evaluation of a persisted rule tree against one applicant.
//!
//! A node's sub-results are its direct requirements (in link order)
//! followed by its child nodes (in link order). The combinator decides the
//! verdict; satisfied names and missing subject codes are aggregated from
//! every sub-result regardless of the combinator.

use crate::config::EngineConfig;
use crate::graph::RuleStore;
use crate::profile::ApplicantProfile;
use crate::requirement::RequirementEvaluator;
use crate::{Combinator, EvaluationResult, OpptakError, RuleNodeId};
use std::collections::BTreeSet;

/// Evaluates rule nodes recursively.
#[derive(Debug)]
pub struct NodeEvaluator<'a, S: RuleStore + ?Sized> {
    store: &'a S,
    requirements: RequirementEvaluator<'a, S>,
    max_depth: usize,
}

impl<'a, S: RuleStore + ?Sized> NodeEvaluator<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, config: &'a EngineConfig) -> Self {
        Self {
            store,
            requirements: RequirementEvaluator::new(store, config),
            max_depth: config.max_rule_depth,
        }
    }

    /// Evaluate the tree rooted at `id`.
    ///
    /// An unknown id yields the not-found result, never an error.
    pub fn evaluate(
        &self,
        profile: &ApplicantProfile,
        id: RuleNodeId,
    ) -> Result<EvaluationResult, OpptakError> {
        self.evaluate_node(profile, id, 0)
    }

    fn evaluate_node(
        &self,
        profile: &ApplicantProfile,
        id: RuleNodeId,
        depth: usize,
    ) -> Result<EvaluationResult, OpptakError> {
        if depth >= self.max_depth {
            return Err(OpptakError::DepthExceeded(self.max_depth));
        }
        let Some(links) = self.store.node_links(id)? else {
            return Ok(EvaluationResult::node_not_found(id));
        };

        let mut results = Vec::with_capacity(links.requirements.len() + links.children.len());
        for requirement in &links.requirements {
            results.push(self.requirements.evaluate(profile, requirement)?);
        }
        for child in &links.children {
            let result = self.evaluate_node(profile, child.id, depth.saturating_add(1))?;
            results.push(result);
        }

        Ok(combine(links.node.combinator, results))
    }
}

/// Combine sub-results under a combinator.
#[must_use]
pub fn combine(combinator: Combinator, results: Vec<EvaluationResult>) -> EvaluationResult {
    let total = results.len();
    let passed = results.iter().filter(|result| result.satisfied).count();

    let (satisfied, rationale) = match combinator {
        Combinator::And => (passed == total, format!("{passed} of {total} satisfied")),
        Combinator::Or => (
            passed >= 1,
            format!("{passed} of {total} satisfied (1 required)"),
        ),
        Combinator::Not => (
            passed != total,
            format!("{passed} of {total} satisfied (negated)"),
        ),
        Combinator::Requirement => {
            let rationale = match results.as_slice() {
                [single] => single.rationale.clone(),
                _ => format!("{passed} of {total} satisfied"),
            };
            (passed == total, rationale)
        }
    };

    let mut seen = BTreeSet::new();
    let mut satisfied_requirements = Vec::new();
    let mut missing_subject_codes = Vec::new();
    for result in results {
        satisfied_requirements.extend(result.satisfied_requirements);
        for code in result.missing_subject_codes {
            if seen.insert(code.clone()) {
                missing_subject_codes.push(code);
            }
        }
    }

    EvaluationResult {
        satisfied,
        rationale,
        satisfied_requirements,
        missing_subject_codes,
    }
}
