//! # Expression Renderer
//!
//! Infix text for a persisted rule tree, for display only:
//! `Generell studiekompetanse OG (Matematikk R1 ELLER Matematikk S1+S2)`.

use crate::config::RenderLabels;
use crate::graph::RuleStore;
use crate::{Combinator, OpptakError, RuleNodeId};

/// Renders rule trees with configurable connective words.
#[derive(Debug)]
pub struct ExpressionRenderer<'a, S: RuleStore + ?Sized> {
    store: &'a S,
    labels: &'a RenderLabels,
    max_depth: usize,
}

impl<'a, S: RuleStore + ?Sized> ExpressionRenderer<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, labels: &'a RenderLabels, max_depth: usize) -> Self {
        Self {
            store,
            labels,
            max_depth,
        }
    }

    /// Render the tree rooted at `id`. Empty if the node is unknown or has
    /// nothing to show.
    pub fn render(&self, id: RuleNodeId) -> Result<String, OpptakError> {
        Ok(self
            .render_node(id, 0)?
            .map(|(text, _)| text)
            .unwrap_or_default())
    }

    /// Returns the text and whether the node is a leaf.
    fn render_node(
        &self,
        id: RuleNodeId,
        depth: usize,
    ) -> Result<Option<(String, bool)>, OpptakError> {
        if depth >= self.max_depth {
            return Err(OpptakError::DepthExceeded(self.max_depth));
        }
        let Some(links) = self.store.node_links(id)? else {
            return Ok(None);
        };

        let mut parts: Vec<String> = links
            .requirements
            .iter()
            .map(|requirement| requirement.name.clone())
            .collect();
        for child in &links.children {
            match self.render_node(child.id, depth.saturating_add(1))? {
                Some((text, _)) if text.is_empty() => {}
                Some((text, true)) => parts.push(text),
                Some((text, false)) => parts.push(format!("({text})")),
                None => {}
            }
        }

        if parts.is_empty() {
            return Ok(Some((String::new(), links.is_leaf())));
        }

        let and = format!(" {} ", self.labels.and);
        let text = match links.node.combinator {
            Combinator::And | Combinator::Requirement => parts.join(&and),
            Combinator::Or => parts.join(&format!(" {} ", self.labels.or)),
            Combinator::Not => format!("{} ({})", self.labels.not, parts.join(&and)),
        };
        Ok(Some((text, links.is_leaf())))
    }
}
