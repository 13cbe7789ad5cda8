//! # Rule Expressions
//!
//! The transient, in-memory form of a requirement tree. This is the
//! interchange format between callers and the persister/builder.
//!
//! JSON shape:
//!
//! ```json
//! {"type": "GROUP", "operator": "OR", "children": [
//!     {"type": "REQUIREMENT", "requirementId": 3, "requirementName": "Matematikk R1"},
//!     {"type": "REQUIREMENT", "requirementId": 4}
//! ]}
//! ```

use crate::{Combinator, RequirementId};
use serde::{Deserialize, Serialize};

/// Operator of a `GROUP` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupOperator {
    #[default]
    And,
    Or,
    Not,
}

impl From<GroupOperator> for Combinator {
    fn from(operator: GroupOperator) -> Self {
        match operator {
            GroupOperator::And => Combinator::And,
            GroupOperator::Or => Combinator::Or,
            GroupOperator::Not => Combinator::Not,
        }
    }
}

/// A boolean requirement tree as exchanged with callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleExpression {
    #[serde(rename_all = "camelCase")]
    Group {
        /// `None` is persisted as `AND`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<GroupOperator>,
        #[serde(default)]
        children: Vec<RuleExpression>,
    },
    #[serde(rename_all = "camelCase")]
    Requirement {
        /// Always present on a well-formed tree; a missing id fails `save`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        requirement_id: Option<RequirementId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        requirement_name: Option<String>,
    },
}

impl RuleExpression {
    /// Build a group expression.
    #[must_use]
    pub fn group(operator: GroupOperator, children: Vec<RuleExpression>) -> Self {
        Self::Group {
            operator: Some(operator),
            children,
        }
    }

    /// Build a requirement leaf.
    #[must_use]
    pub fn requirement(id: RequirementId, name: impl Into<String>) -> Self {
        Self::Requirement {
            requirement_id: Some(id),
            requirement_name: Some(name.into()),
        }
    }

    /// Every requirement id in the tree, depth-first as encountered.
    ///
    /// Leaves without an id are skipped; duplicates are kept.
    #[must_use]
    pub fn extract_requirement_ids(&self) -> Vec<RequirementId> {
        let mut ids = Vec::new();
        self.collect_requirement_ids(&mut ids);
        ids
    }

    fn collect_requirement_ids(&self, ids: &mut Vec<RequirementId>) {
        match self {
            Self::Requirement {
                requirement_id: Some(id),
                ..
            } => ids.push(*id),
            Self::Requirement { .. } => {}
            Self::Group { children, .. } => {
                for child in children {
                    child.collect_requirement_ids(ids);
                }
            }
        }
    }

    /// Label used for the persisted node when the caller gives none.
    #[must_use]
    pub fn synthetic_label(&self) -> String {
        match self {
            Self::Group { operator, .. } => {
                let combinator = Combinator::from(operator.unwrap_or_default());
                format!("{combinator} group")
            }
            Self::Requirement {
                requirement_name: Some(name),
                ..
            } if !name.trim().is_empty() => name.clone(),
            Self::Requirement {
                requirement_id: Some(id),
                ..
            } => format!("Requirement {id}"),
            Self::Requirement { .. } => "Requirement".to_string(),
        }
    }

    /// Number of nodes the persister creates for this tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        match self {
            Self::Requirement { .. } => 1,
            Self::Group { children, .. } => children
                .iter()
                .fold(1usize, |acc, child| acc.saturating_add(child.node_count())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RuleExpression {
        RuleExpression::group(
            GroupOperator::And,
            vec![
                RuleExpression::requirement(RequirementId(1), "Generell studiekompetanse"),
                RuleExpression::group(
                    GroupOperator::Or,
                    vec![
                        RuleExpression::requirement(RequirementId(2), "Matematikk R1"),
                        RuleExpression::requirement(RequirementId(3), "Matematikk S1+S2"),
                    ],
                ),
                RuleExpression::requirement(RequirementId(2), "Matematikk R1"),
            ],
        )
    }

    #[test]
    fn extract_ids_depth_first_with_duplicates() {
        let ids = sample().extract_requirement_ids();
        assert_eq!(
            ids,
            vec![
                RequirementId(1),
                RequirementId(2),
                RequirementId(3),
                RequirementId(2)
            ]
        );
    }

    #[test]
    fn extract_ids_skips_leaves_without_id() {
        let expr = RuleExpression::group(
            GroupOperator::Or,
            vec![RuleExpression::Requirement {
                requirement_id: None,
                requirement_name: Some("dangling".to_string()),
            }],
        );
        assert!(expr.extract_requirement_ids().is_empty());
    }

    #[test]
    fn json_shape_uses_type_tag_and_camel_case() {
        let json = serde_json::to_value(RuleExpression::requirement(RequirementId(7), "R1"))
            .expect("serialize");
        assert_eq!(json["type"], "REQUIREMENT");
        assert_eq!(json["requirementId"], 7);
        assert_eq!(json["requirementName"], "R1");
    }

    #[test]
    fn group_without_operator_parses() {
        let expr: RuleExpression = serde_json::from_str(
            r#"{"type": "GROUP", "children": [{"type": "REQUIREMENT", "requirementId": 4}]}"#,
        )
        .expect("parse");
        match expr {
            RuleExpression::Group { operator, children } => {
                assert!(operator.is_none());
                assert_eq!(children.len(), 1);
            }
            RuleExpression::Requirement { .. } => unreachable!("parsed as group"),
        }
    }

    #[test]
    fn synthetic_labels() {
        assert_eq!(
            RuleExpression::Group {
                operator: None,
                children: vec![]
            }
            .synthetic_label(),
            "AND group"
        );
        assert_eq!(
            RuleExpression::Requirement {
                requirement_id: Some(RequirementId(5)),
                requirement_name: None
            }
            .synthetic_label(),
            "Requirement 5"
        );
        assert_eq!(
            RuleExpression::requirement(RequirementId(5), "Fysikk 1").synthetic_label(),
            "Fysikk 1"
        );
    }

    #[test]
    fn node_count_counts_every_expression() {
        assert_eq!(sample().node_count(), 6);
    }
}
