//! # Expression Persister
//!
//! Writes a `RuleExpression` into a store as a tree of rule nodes and
//! deletes such trees again.
//!
//! The expression is first staged into a `RuleTreeBatch` without touching
//! the store. Any malformed input fails at that point. The batch is then
//! committed in one store transaction, so a save either creates the whole
//! tree or nothing.

use crate::expression::RuleExpression;
use crate::graph::{RuleStore, RuleTreeBatch};
use crate::primitives::MAX_LABEL_LENGTH;
use crate::{Combinator, OpptakError, PathwayId, RuleNodeId};

/// Stage an expression into a batch. Index 0 is the top node.
///
/// `label` names the top node; `None` (or a blank label) falls back to a
/// synthetic label. Nesting deeper than `max_depth` is rejected, and so is
/// any node label, explicit or taken from a requirement name, longer than
/// `MAX_LABEL_LENGTH` characters.
pub fn stage_expression(
    expression: &RuleExpression,
    label: Option<&str>,
    max_depth: usize,
) -> Result<RuleTreeBatch, OpptakError> {
    let label = match label.map(str::trim) {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => expression.synthetic_label(),
    };

    let mut batch = RuleTreeBatch::new();
    stage_node(&mut batch, expression, label, 0, max_depth)?;
    batch.validate()?;
    Ok(batch)
}

fn stage_node(
    batch: &mut RuleTreeBatch,
    expression: &RuleExpression,
    label: String,
    depth: usize,
    max_depth: usize,
) -> Result<usize, OpptakError> {
    if depth >= max_depth {
        return Err(OpptakError::DepthExceeded(max_depth));
    }
    if label.chars().count() > MAX_LABEL_LENGTH {
        return Err(OpptakError::Validation(format!(
            "label longer than {MAX_LABEL_LENGTH} characters"
        )));
    }

    match expression {
        RuleExpression::Requirement {
            requirement_id: None,
            ..
        } => Err(OpptakError::Validation(
            "REQUIREMENT expression without requirementId".to_string(),
        )),
        RuleExpression::Requirement {
            requirement_id: Some(id),
            ..
        } => {
            let index = batch.push_node(label, Combinator::Requirement);
            batch.link_requirement(index, *id)?;
            Ok(index)
        }
        RuleExpression::Group { operator, children } => {
            let index = batch.push_node(label, Combinator::from(operator.unwrap_or_default()));
            for child in children {
                let child_index = stage_node(
                    batch,
                    child,
                    child.synthetic_label(),
                    depth.saturating_add(1),
                    max_depth,
                )?;
                batch.link_child(index, child_index)?;
            }
            Ok(index)
        }
    }
}

/// Saves and deletes rule trees in a store.
#[derive(Debug)]
pub struct ExpressionPersister<'a, S: RuleStore + ?Sized> {
    store: &'a mut S,
    max_depth: usize,
}

impl<'a, S: RuleStore + ?Sized> ExpressionPersister<'a, S> {
    #[must_use]
    pub fn new(store: &'a mut S, max_depth: usize) -> Self {
        Self { store, max_depth }
    }

    /// Persist an expression. Returns the id of the top node.
    pub fn save(
        &mut self,
        expression: &RuleExpression,
        label: Option<&str>,
    ) -> Result<RuleNodeId, OpptakError> {
        let batch = stage_expression(expression, label, self.max_depth)?;
        let root = self.store.commit_tree(&batch)?;
        tracing::debug!("Saved rule tree {} ({} nodes)", root, batch.len());
        Ok(root)
    }

    /// Delete a tree and everything below it. Unknown ids are a no-op.
    pub fn delete(&mut self, root: RuleNodeId) -> Result<usize, OpptakError> {
        let removed = self.store.delete_subtree(root)?;
        if removed > 0 {
            tracing::debug!("Deleted rule tree {} ({} nodes)", root, removed);
        }
        Ok(removed)
    }

    /// Swap a pathway's rule tree in one transaction. `None` clears it.
    pub fn replace_pathway_rule(
        &mut self,
        pathway: PathwayId,
        expression: Option<&RuleExpression>,
    ) -> Result<Option<RuleNodeId>, OpptakError> {
        let batch = expression
            .map(|expression| stage_expression(expression, None, self.max_depth))
            .transpose()?;
        let root = self.store.replace_pathway_rule(pathway, batch.as_ref())?;
        tracing::debug!("Replaced rule of pathway {}: {:?}", pathway, root);
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::GroupOperator;
    use crate::graph::Graph;
    use crate::primitives::DEFAULT_MAX_RULE_DEPTH;
    use crate::{Requirement, RequirementId, RequirementKind};

    fn graph_with_requirements(ids: &[u64]) -> Graph {
        let mut graph = Graph::new();
        for &id in ids {
            graph
                .put_requirement(Requirement {
                    id: RequirementId(id),
                    name: format!("R{id}"),
                    kind: RequirementKind::SubjectGrade { min_grade: None },
                })
                .expect("put");
        }
        graph
    }

    fn nested(depth: usize) -> RuleExpression {
        (0..depth).fold(
            RuleExpression::requirement(RequirementId(1), "R1"),
            |inner, _| RuleExpression::group(GroupOperator::And, vec![inner]),
        )
    }

    #[test]
    fn save_names_top_node_with_label() {
        let mut graph = graph_with_requirements(&[1, 2]);
        let expression = RuleExpression::group(
            GroupOperator::Or,
            vec![
                RuleExpression::requirement(RequirementId(1), "R1"),
                RuleExpression::requirement(RequirementId(2), "R2"),
            ],
        );

        let root = ExpressionPersister::new(&mut graph, DEFAULT_MAX_RULE_DEPTH)
            .save(&expression, Some("Matematikk"))
            .expect("save");

        let links = graph.node_links(root).expect("links").expect("exists");
        assert_eq!(links.node.name, "Matematikk");
        assert_eq!(links.node.combinator, Combinator::Or);
        assert_eq!(links.children[0].name, "R1");
        assert_eq!(links.children[1].combinator, Combinator::Requirement);
    }

    #[test]
    fn blank_label_falls_back_to_synthetic() {
        let batch = stage_expression(
            &RuleExpression::Group {
                operator: None,
                children: vec![RuleExpression::requirement(RequirementId(1), "R1")],
            },
            Some("   "),
            DEFAULT_MAX_RULE_DEPTH,
        )
        .expect("stage");

        assert_eq!(batch.nodes()[0].name, "AND group");
        assert_eq!(batch.nodes()[0].combinator, Combinator::And);
    }

    #[test]
    fn missing_requirement_id_is_rejected_before_any_write() {
        let mut graph = graph_with_requirements(&[1]);
        let expression = RuleExpression::group(
            GroupOperator::And,
            vec![
                RuleExpression::requirement(RequirementId(1), "R1"),
                RuleExpression::Requirement {
                    requirement_id: None,
                    requirement_name: Some("broken".to_string()),
                },
            ],
        );

        let result =
            ExpressionPersister::new(&mut graph, DEFAULT_MAX_RULE_DEPTH).save(&expression, None);

        assert!(matches!(result, Err(OpptakError::Validation(_))));
        assert_eq!(graph.rule_node_count().expect("count"), 0);
    }

    #[test]
    fn too_deep_expression_is_rejected() {
        let result = stage_expression(&nested(10), None, 5);
        assert!(matches!(result, Err(OpptakError::DepthExceeded(5))));
        assert!(stage_expression(&nested(4), None, 5).is_ok());
    }

    #[test]
    fn overlong_label_is_rejected() {
        let label = "x".repeat(MAX_LABEL_LENGTH + 1);
        let result = stage_expression(&nested(0), Some(&label), DEFAULT_MAX_RULE_DEPTH);
        assert!(matches!(result, Err(OpptakError::Validation(_))));
    }

    #[test]
    fn overlong_requirement_name_is_rejected_at_any_level() {
        let mut graph = graph_with_requirements(&[1]);
        let name = "x".repeat(MAX_LABEL_LENGTH * 100);
        let long_leaf = RuleExpression::requirement(RequirementId(1), name);
        let group = RuleExpression::group(
            GroupOperator::And,
            vec![
                RuleExpression::requirement(RequirementId(1), "R1"),
                long_leaf.clone(),
            ],
        );

        let mut persister = ExpressionPersister::new(&mut graph, DEFAULT_MAX_RULE_DEPTH);
        let top = persister.save(&long_leaf, None);
        assert!(matches!(top, Err(OpptakError::Validation(_))));
        let nested = persister.save(&group, None);
        assert!(matches!(nested, Err(OpptakError::Validation(_))));

        assert_eq!(graph.rule_node_count().expect("count"), 0);
    }

    #[test]
    fn label_at_limit_is_accepted() {
        let label = "x".repeat(MAX_LABEL_LENGTH);
        let leaf = RuleExpression::requirement(RequirementId(1), label.clone());
        let batch = stage_expression(&leaf, None, DEFAULT_MAX_RULE_DEPTH).expect("stage");
        assert_eq!(batch.nodes()[0].name, label);
    }

    #[test]
    fn delete_unknown_root_is_noop() {
        let mut graph = graph_with_requirements(&[1]);
        let removed = ExpressionPersister::new(&mut graph, DEFAULT_MAX_RULE_DEPTH)
            .delete(RuleNodeId(404))
            .expect("delete");
        assert_eq!(removed, 0);
    }

    #[test]
    fn staged_node_count_matches_expression() {
        let expression = RuleExpression::group(
            GroupOperator::Not,
            vec![nested(2), RuleExpression::requirement(RequirementId(3), "R3")],
        );
        let batch = stage_expression(&expression, None, DEFAULT_MAX_RULE_DEPTH).expect("stage");
        assert_eq!(batch.len(), expression.node_count());
    }
}
