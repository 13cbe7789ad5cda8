//! # Opptak HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Store status
//! - `POST /rules` - Persist a rule expression
//! - `GET /rules/{id}` - Rebuild a rule expression
//! - `GET /rules/{id}/text` - Render a rule tree as text
//! - `DELETE /rules/{id}` - Delete a rule tree
//! - `POST /rules/requirement-ids` - Requirement ids of an expression
//! - `PUT /pathways/{id}/rule` - Replace or detach a pathway's rule tree
//! - `GET /applicants/{a}/pathways/{p}/evaluation` - Evaluate one pathway
//! - `GET /applicants/{a}/evaluations` - Evaluate all pathways
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `OPPTAK_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `OPPTAK_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)

mod handlers;
mod middleware;
mod types;

pub use handlers::error_status;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    ErrorResponse, HealthResponse, PathwayRuleRequest, PathwayRuleResponse, RequirementIdsResponse,
    RuleTextResponse, SaveRuleRequest, SaveRuleResponse, StatusResponse,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post, put},
};
use opptak_core::{OpptakError, Session};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size (2 MB).
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the engine session.
#[derive(Clone)]
pub struct AppState {
    /// The session owning the rule store.
    pub session: Arc<RwLock<Session>>,
}

impl AppState {
    /// Create new app state with a session.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build CORS layer from `OPPTAK_CORS_ORIGINS`.
///
/// - `*`: allows all origins
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("OPPTAK_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (OPPTAK_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in OPPTAK_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(CORS_METHODS)
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::info!("CORS: No OPPTAK_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting (if enabled)
pub fn create_router(state: AppState) -> Router {
    let rate_limit = get_rate_limit_from_env();

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/rules", post(handlers::save_rule_handler))
        .route(
            "/rules/requirement-ids",
            post(handlers::requirement_ids_handler),
        )
        .route(
            "/rules/{id}",
            get(handlers::get_rule_handler).delete(handlers::delete_rule_handler),
        )
        .route("/rules/{id}/text", get(handlers::rule_text_handler))
        .route("/pathways/{id}/rule", put(handlers::pathway_rule_handler))
        .route(
            "/applicants/{applicant}/pathways/{pathway}/evaluation",
            get(handlers::evaluation_handler),
        )
        .route(
            "/applicants/{applicant}/evaluations",
            get(handlers::evaluations_handler),
        );

    if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_SIZE)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, session: Session) -> Result<(), OpptakError> {
    let state = AppState::new(session);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| OpptakError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Opptak HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| OpptakError::IoError(format!("Server error: {}", e)))
}
