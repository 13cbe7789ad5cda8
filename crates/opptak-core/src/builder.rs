//! # Expression Builder
//!
//! Reads a persisted rule tree back into a `RuleExpression`.
//!
//! A node with exactly one direct requirement and no children collapses to
//! a `REQUIREMENT` expression whatever its combinator. Trees written by the
//! persister come back unchanged; other layouts are canonicalized.

use crate::expression::{GroupOperator, RuleExpression};
use crate::graph::{NodeLinks, RuleStore};
use crate::{Combinator, OpptakError, RuleNodeId};

/// Rebuilds expressions from a store.
#[derive(Debug)]
pub struct ExpressionBuilder<'a, S: RuleStore + ?Sized> {
    store: &'a S,
    max_depth: usize,
}

impl<'a, S: RuleStore + ?Sized> ExpressionBuilder<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, max_depth: usize) -> Self {
        Self { store, max_depth }
    }

    /// Build the expression rooted at `root`. `None` if the node is unknown.
    pub fn build(&self, root: RuleNodeId) -> Result<Option<RuleExpression>, OpptakError> {
        self.build_node(root, 0)
    }

    fn build_node(
        &self,
        id: RuleNodeId,
        depth: usize,
    ) -> Result<Option<RuleExpression>, OpptakError> {
        if depth >= self.max_depth {
            return Err(OpptakError::DepthExceeded(self.max_depth));
        }
        let Some(links) = self.store.node_links(id)? else {
            return Ok(None);
        };

        if links.is_leaf() {
            let requirement = &links.requirements[0];
            return Ok(Some(RuleExpression::requirement(
                requirement.id,
                requirement.name.clone(),
            )));
        }

        let operator = group_operator(&links);
        let mut children: Vec<RuleExpression> = links
            .requirements
            .iter()
            .map(|requirement| {
                RuleExpression::requirement(requirement.id, requirement.name.clone())
            })
            .collect();

        for child in &links.children {
            let Some(expression) = self.build_node(child.id, depth.saturating_add(1))? else {
                tracing::warn!("Skipping child {} of node {}: did not build", child.id, id);
                continue;
            };
            children.push(expression);
        }

        Ok(Some(RuleExpression::group(operator, children)))
    }
}

fn group_operator(links: &NodeLinks) -> GroupOperator {
    match links.node.combinator {
        Combinator::And | Combinator::Requirement => GroupOperator::And,
        Combinator::Or => GroupOperator::Or,
        Combinator::Not => GroupOperator::Not,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Graph, RuleTreeBatch};
    use crate::persister::ExpressionPersister;
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

    #[test]
    fn unknown_root_builds_nothing() {
        let graph = Graph::new();
        let builder = ExpressionBuilder::new(&graph, DEFAULT_MAX_RULE_DEPTH);
        assert_eq!(builder.build(RuleNodeId(3)).expect("build"), None);
    }

    #[test]
    fn saved_tree_rebuilds_with_same_shape() {
        let mut graph = graph_with_requirements(&[1, 2, 3]);
        let expression = RuleExpression::group(
            GroupOperator::And,
            vec![
                RuleExpression::requirement(RequirementId(1), "R1"),
                RuleExpression::group(
                    GroupOperator::Not,
                    vec![
                        RuleExpression::requirement(RequirementId(2), "R2"),
                        RuleExpression::requirement(RequirementId(3), "R3"),
                    ],
                ),
            ],
        );
        let root = ExpressionPersister::new(&mut graph, DEFAULT_MAX_RULE_DEPTH)
            .save(&expression, None)
            .expect("save");

        let rebuilt = ExpressionBuilder::new(&graph, DEFAULT_MAX_RULE_DEPTH)
            .build(root)
            .expect("build");

        assert_eq!(rebuilt, Some(expression));
    }

    #[test]
    fn single_requirement_group_collapses() {
        let mut graph = graph_with_requirements(&[1]);
        let mut batch = RuleTreeBatch::new();
        let root = batch.push_node("or with one link", Combinator::Or);
        batch
            .link_requirement(root, RequirementId(1))
            .expect("link");
        let root = graph.commit_tree(&batch).expect("commit");

        let rebuilt = ExpressionBuilder::new(&graph, DEFAULT_MAX_RULE_DEPTH)
            .build(root)
            .expect("build");

        assert_eq!(
            rebuilt,
            Some(RuleExpression::requirement(RequirementId(1), "R1"))
        );
    }

    #[test]
    fn direct_requirements_come_before_children() {
        let mut graph = graph_with_requirements(&[1, 2, 3]);
        let mut batch = RuleTreeBatch::new();
        let root = batch.push_node("mixed", Combinator::Requirement);
        batch
            .link_requirement(root, RequirementId(1))
            .expect("link");
        batch
            .link_requirement(root, RequirementId(2))
            .expect("link");
        let child = batch.push_node("R3", Combinator::Requirement);
        batch
            .link_requirement(child, RequirementId(3))
            .expect("link");
        batch.link_child(root, child).expect("link");
        let root = graph.commit_tree(&batch).expect("commit");

        let rebuilt = ExpressionBuilder::new(&graph, DEFAULT_MAX_RULE_DEPTH)
            .build(root)
            .expect("build")
            .expect("exists");

        assert_eq!(
            rebuilt,
            RuleExpression::group(
                GroupOperator::And,
                vec![
                    RuleExpression::requirement(RequirementId(1), "R1"),
                    RuleExpression::requirement(RequirementId(2), "R2"),
                    RuleExpression::requirement(RequirementId(3), "R3"),
                ],
            )
        );
    }
}
