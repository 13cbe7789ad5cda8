//! # Property-Based Tests
//!
//! Round-trip and evaluation invariants over generated rule trees.

use opptak_core::{
    AdmissionPathway, Applicant, ApplicantId, ApplicantRecord, Document, GroupOperator, PathwayId,
    Requirement, RequirementId, RequirementKind, RuleExpression, Session, SubjectRecord,
};
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use std::collections::BTreeSet;

const CATALOG_SIZE: u64 = 4;

// =============================================================================
// STRATEGIES
// =============================================================================

fn operator_strategy() -> impl Strategy<Value = GroupOperator> {
    prop_oneof![
        Just(GroupOperator::And),
        Just(GroupOperator::Or),
        Just(GroupOperator::Not),
    ]
}

fn expression_strategy() -> impl Strategy<Value = RuleExpression> {
    let leaf = (0..CATALOG_SIZE)
        .prop_map(|i| RuleExpression::requirement(RequirementId(i), format!("R{i}")));
    leaf.prop_recursive(4, 48, 4, |inner| {
        (operator_strategy(), vec(inner, 0..4))
            .prop_map(|(operator, children)| RuleExpression::group(operator, children))
    })
}

// =============================================================================
// HELPERS
// =============================================================================

/// Requirement `i` is satisfied by holding subject code `C{i}`.
fn seeded_session(held: &BTreeSet<u64>) -> Session {
    let mut session = Session::new();
    for i in 0..CATALOG_SIZE {
        session
            .put_requirement(Requirement {
                id: RequirementId(i),
                name: format!("R{i}"),
                kind: RequirementKind::SubjectGrade { min_grade: None },
            })
            .expect("requirement");
        session
            .put_qualifying_codes(RequirementId(i), vec![format!("C{i}")])
            .expect("codes");
    }
    session
        .put_applicant(ApplicantRecord {
            applicant: Applicant {
                id: ApplicantId(1),
                name: "Generated".to_string(),
                birth_date: None,
            },
            documents: vec![Document {
                kind: "vitnemal".to_string(),
                subject_records: held
                    .iter()
                    .map(|i| SubjectRecord {
                        code: format!("C{i}"),
                        name: format!("Subject {i}"),
                        grade: "4".to_string(),
                        grading_system: "1-6".to_string(),
                        date: None,
                    })
                    .collect(),
            }],
        })
        .expect("applicant");
    session
        .put_pathway(AdmissionPathway {
            id: PathwayId(1),
            name: "Generated".to_string(),
            description: String::new(),
            rule_root: None,
        })
        .expect("pathway");
    session
}

/// Plain boolean reading of an expression.
fn reference_eval(expression: &RuleExpression, held: &BTreeSet<u64>) -> bool {
    match expression {
        RuleExpression::Requirement { requirement_id, .. } => {
            requirement_id.is_some_and(|id| held.contains(&id.0))
        }
        RuleExpression::Group { operator, children } => {
            let all = children.iter().all(|child| reference_eval(child, held));
            match operator.unwrap_or_default() {
                GroupOperator::And => all,
                GroupOperator::Or => children.iter().any(|child| reference_eval(child, held)),
                GroupOperator::Not => !all,
            }
        }
    }
}

fn leaf_count(expression: &RuleExpression) -> usize {
    match expression {
        RuleExpression::Requirement { .. } => 1,
        RuleExpression::Group { children, .. } => children.iter().map(leaf_count).sum(),
    }
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// save -> build reproduces the tree, operators included.
    #[test]
    fn save_then_build_is_identity_on_generated_trees(expression in expression_strategy()) {
        let mut session = seeded_session(&BTreeSet::new());

        let root = session
            .save_logical_expression(&expression, None)
            .expect("save");
        let rebuilt = session.build_logical_expression(root).expect("build");

        prop_assert_eq!(rebuilt, Some(expression.clone()));
        prop_assert_eq!(session.rule_node_count().expect("count"), expression.node_count());
    }

    /// Requirement id extraction sees every leaf, in order, with duplicates.
    #[test]
    fn extraction_sees_every_leaf(expression in expression_strategy()) {
        let ids = Session::extract_requirement_ids(&expression);
        prop_assert_eq!(ids.len(), leaf_count(&expression));
    }

    /// Evaluating the persisted tree agrees with the plain boolean reading.
    #[test]
    fn evaluation_matches_boolean_semantics(
        expression in expression_strategy(),
        held in btree_set(0..CATALOG_SIZE, 0..=CATALOG_SIZE as usize)
    ) {
        let mut session = seeded_session(&held);
        session
            .replace_pathway_rule(PathwayId(1), Some(&expression))
            .expect("replace");

        let result = session
            .evaluate_opptaks_vei(ApplicantId(1), PathwayId(1))
            .expect("evaluate")
            .expect("known");

        prop_assert_eq!(result.satisfied, reference_eval(&expression, &held));

        let mut seen = BTreeSet::new();
        for code in &result.missing_subject_codes {
            prop_assert!(seen.insert(code.clone()), "duplicate missing code {}", code);
        }
    }

    /// Deleting a saved tree removes every node it created.
    #[test]
    fn delete_removes_whole_tree(expression in expression_strategy()) {
        let mut session = seeded_session(&BTreeSet::new());
        let root = session
            .save_logical_expression(&expression, None)
            .expect("save");

        let removed = session.delete_logical_expression(root).expect("delete");

        prop_assert_eq!(removed, expression.node_count());
        prop_assert_eq!(session.rule_node_count().expect("count"), 0);
    }
}
