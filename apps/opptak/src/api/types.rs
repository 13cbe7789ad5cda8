//! # API Request/Response Types
//!
//! JSON structures for the HTTP API. Field names are camelCase on the wire.

use opptak_core::{RequirementId, RuleExpression, RuleNodeId};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Store status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub rule_node_count: usize,
    pub requirement_count: usize,
    pub pathway_count: usize,
    pub persistent: bool,
}

// =============================================================================
// RULES
// =============================================================================

/// Body of `POST /rules`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRuleRequest {
    pub expression: RuleExpression,
    #[serde(default)]
    pub label: Option<String>,
}

/// Response of `POST /rules`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRuleResponse {
    pub node_id: u64,
}

impl From<RuleNodeId> for SaveRuleResponse {
    fn from(id: RuleNodeId) -> Self {
        Self { node_id: id.0 }
    }
}

/// Response of `GET /rules/{id}/text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTextResponse {
    pub rule_text: String,
}

/// Response of `POST /rules/requirement-ids`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementIdsResponse {
    pub requirement_ids: Vec<u64>,
}

impl From<Vec<RequirementId>> for RequirementIdsResponse {
    fn from(ids: Vec<RequirementId>) -> Self {
        Self {
            requirement_ids: ids.into_iter().map(|id| id.0).collect(),
        }
    }
}

// =============================================================================
// PATHWAYS
// =============================================================================

/// Body of `PUT /pathways/{id}/rule`. A missing expression detaches the rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathwayRuleRequest {
    #[serde(default)]
    pub expression: Option<RuleExpression>,
}

/// Response of `PUT /pathways/{id}/rule`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathwayRuleResponse {
    pub node_id: Option<u64>,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error body returned with every non-2xx response produced by a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}
