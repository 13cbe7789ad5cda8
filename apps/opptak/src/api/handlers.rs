//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Engine errors map to status codes in [`error_status`]; lookups that
//! miss become 404.

use super::{
    AppState,
    types::{
        ErrorResponse, HealthResponse, PathwayRuleRequest, PathwayRuleResponse,
        RequirementIdsResponse, RuleTextResponse, SaveRuleRequest, SaveRuleResponse,
        StatusResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opptak_core::{ApplicantId, OpptakError, PathwayId, RuleExpression, RuleNodeId, Session};

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// HTTP status for an engine error.
pub fn error_status(error: &OpptakError) -> StatusCode {
    match error {
        OpptakError::Validation(_)
        | OpptakError::RequirementNotFound(_)
        | OpptakError::DepthExceeded(_) => StatusCode::BAD_REQUEST,
        OpptakError::PathwayNotFound(_) => StatusCode::NOT_FOUND,
        OpptakError::SerializationError(_)
        | OpptakError::DeserializationError(_)
        | OpptakError::IoError(_)
        | OpptakError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &OpptakError) -> Response {
    let status = error_status(error);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", error);
    } else {
        tracing::debug!("Request rejected: {}", error);
    }
    (status, Json(ErrorResponse::new(error.to_string()))).into_response()
}

fn not_found(msg: String) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new(msg))).into_response()
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

fn status_of(session: &Session) -> Result<StatusResponse, OpptakError> {
    Ok(StatusResponse {
        rule_node_count: session.rule_node_count()?,
        requirement_count: session.requirements()?.len(),
        pathway_count: session.pathways()?.len(),
        persistent: session.is_persistent(),
    })
}

/// Store status.
pub async fn status_handler(State(state): State<AppState>) -> Response {
    let session = state.session.read().await;
    match status_of(&session) {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// RULE HANDLERS
// =============================================================================

/// Persist an expression as a new rule tree.
pub async fn save_rule_handler(
    State(state): State<AppState>,
    Json(request): Json<SaveRuleRequest>,
) -> Response {
    let mut session = state.session.write().await;
    match session.save_logical_expression(&request.expression, request.label.as_deref()) {
        Ok(root) => (StatusCode::CREATED, Json(SaveRuleResponse::from(root))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Rebuild the expression rooted at a node.
pub async fn get_rule_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    let session = state.session.read().await;
    match session.build_logical_expression(RuleNodeId(id)) {
        Ok(Some(expression)) => (StatusCode::OK, Json(expression)).into_response(),
        Ok(None) => not_found(format!("Rule node {} not found", id)),
        Err(e) => error_response(&e),
    }
}

/// Render a rule tree as infix text. Unknown nodes render as empty text.
pub async fn rule_text_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    let session = state.session.read().await;
    match session.render_rule(RuleNodeId(id)) {
        Ok(rule_text) => (StatusCode::OK, Json(RuleTextResponse { rule_text })).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Delete a rule tree. Idempotent.
pub async fn delete_rule_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    let mut session = state.session.write().await;
    match session.delete_logical_expression(RuleNodeId(id)) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

/// Requirement ids of an expression, depth-first with duplicates.
pub async fn requirement_ids_handler(Json(expression): Json<RuleExpression>) -> impl IntoResponse {
    let ids = Session::extract_requirement_ids(&expression);
    Json(RequirementIdsResponse::from(ids))
}

// =============================================================================
// PATHWAY HANDLERS
// =============================================================================

/// Replace or detach a pathway's rule tree.
pub async fn pathway_rule_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<PathwayRuleRequest>,
) -> Response {
    let mut session = state.session.write().await;
    match session.replace_pathway_rule(PathwayId(id), request.expression.as_ref()) {
        Ok(root) => (
            StatusCode::OK,
            Json(PathwayRuleResponse {
                node_id: root.map(|r| r.0),
            }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// EVALUATION HANDLERS
// =============================================================================

/// Evaluate one applicant against one pathway.
pub async fn evaluation_handler(
    State(state): State<AppState>,
    Path((applicant, pathway)): Path<(u64, u64)>,
) -> Response {
    let session = state.session.read().await;
    match session.evaluate_opptaks_vei(ApplicantId(applicant), PathwayId(pathway)) {
        Ok(Some(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(None) => not_found(format!(
            "Applicant {} or pathway {} not found",
            applicant, pathway
        )),
        Err(e) => error_response(&e),
    }
}

/// Evaluate one applicant against every pathway.
pub async fn evaluations_handler(
    State(state): State<AppState>,
    Path(applicant): Path<u64>,
) -> Response {
    let session = state.session.read().await;
    match session.evaluate_applicant(ApplicantId(applicant)) {
        Ok(Some(results)) => (StatusCode::OK, Json(results)).into_response(),
        Ok(None) => not_found(format!("Applicant {} not found", applicant)),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// TESTS
// =============================================================================
