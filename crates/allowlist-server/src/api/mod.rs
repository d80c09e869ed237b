//! HTTP API for the allowlist service.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::logging_middleware;
pub use types::*;

use crate::gate::AdmissionGate;
use crate::verification::TargetResolver;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use social_graph_client::SocialGraph;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Admission gate over the registration store
    pub gate: Arc<AdmissionGate>,
    /// Social graph client; `None` when no API key is configured
    pub social_graph: Option<Arc<dyn SocialGraph>>,
    /// Follow target resolution
    pub targets: Arc<TargetResolver>,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        gate: AdmissionGate,
        social_graph: Option<Arc<dyn SocialGraph>>,
        targets: TargetResolver,
    ) -> Self {
        Self {
            gate: Arc::new(gate),
            social_graph,
            targets: Arc::new(targets),
        }
    }
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/check-registration", get(handlers::check_registration))
        .route("/api/register", post(handlers::register))
        .route(
            "/api/registration-status",
            get(handlers::registration_status),
        )
        .route("/api/verify-follow", post(handlers::verify_follow))
        .route("/api/verify-score", post(handlers::verify_score))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
