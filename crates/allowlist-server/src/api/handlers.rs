//! HTTP request handlers.

use super::types::{
    CheckRegistrationQuery, CheckRegistrationResponse, FidRequest, HealthResponse,
    RegisterRequest, RegisterResponse, RegistrationStatusResponse, VerifyFollowResponse,
    VerifyScoreResponse,
};
use super::AppState;
use crate::error::AllowlistError;
use crate::verification::{check_follow, check_score};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use social_graph_client::SocialGraph;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        phase: state.gate.policy().phase.clone(),
        store: state.gate.store().backend_name().to_string(),
    })
}

/// Look up an existing registration by fid.
pub async fn check_registration(
    State(state): State<AppState>,
    Query(query): Query<CheckRegistrationQuery>,
) -> Result<Json<CheckRegistrationResponse>, AllowlistError> {
    let fid = parse_fid(query.fid.as_deref())?;
    let registration = state.gate.lookup(fid).await?;

    debug!(fid, registered = registration.is_some(), "Registration lookup");

    Ok(Json(CheckRegistrationResponse {
        success: true,
        is_registered: registration.is_some(),
        registration,
    }))
}

/// Submit a registration to the admission gate.
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, AllowlistError> {
    let Json(request) = body.map_err(invalid_body)?;
    info!(fid = ?request.fid, "Registration request received");

    let registration = state.gate.admit(request.into()).await?;

    Ok(Json(RegisterResponse {
        success: true,
        registration,
    }))
}

/// Capacity of the current phase.
pub async fn registration_status(
    State(state): State<AppState>,
) -> Result<Json<RegistrationStatusResponse>, AllowlistError> {
    let report = state.gate.status().await?;
    Ok(Json(report.into()))
}

/// Does the user follow the target account?
pub async fn verify_follow(
    State(state): State<AppState>,
    body: Result<Json<FidRequest>, JsonRejection>,
) -> Result<Json<VerifyFollowResponse>, AllowlistError> {
    let Json(request) = body.map_err(invalid_body)?;
    let fid = required_fid(request.fid)?;
    let graph = social_graph(&state)?;

    let target_fid = state.targets.resolve(graph.as_ref()).await?;
    let is_following = check_follow(graph.as_ref(), fid, target_fid).await?;

    Ok(Json(VerifyFollowResponse {
        success: true,
        is_following,
        target_fid,
        viewer_fid: fid,
    }))
}

/// Reputation score of the user against the configured minimum.
pub async fn verify_score(
    State(state): State<AppState>,
    body: Result<Json<FidRequest>, JsonRejection>,
) -> Result<Json<VerifyScoreResponse>, AllowlistError> {
    let Json(request) = body.map_err(invalid_body)?;
    let fid = required_fid(request.fid)?;
    let graph = social_graph(&state)?;

    let report = check_score(graph.as_ref(), fid, state.gate.policy().min_score).await?;

    Ok(Json(VerifyScoreResponse {
        success: true,
        score: report.score,
        meets_threshold: report.meets_threshold,
        threshold: report.threshold,
        user: report.user.into(),
    }))
}

fn social_graph(state: &AppState) -> Result<Arc<dyn SocialGraph>, AllowlistError> {
    state.social_graph.clone().ok_or_else(|| {
        error!("Social graph API key not configured");
        AllowlistError::NotConfigured("social graph API key".into())
    })
}

fn parse_fid(raw: Option<&str>) -> Result<u64, AllowlistError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AllowlistError::Validation("FID required".into()))?;

    raw.parse::<u64>()
        .ok()
        .filter(|fid| *fid != 0)
        .ok_or_else(|| AllowlistError::Validation("Invalid FID".into()))
}

fn required_fid(fid: Option<u64>) -> Result<u64, AllowlistError> {
    fid.filter(|fid| *fid != 0)
        .ok_or_else(|| AllowlistError::Validation("FID required".into()))
}

fn invalid_body(rejection: JsonRejection) -> AllowlistError {
    AllowlistError::Validation(format!("Invalid request body: {}", rejection.body_text()))
}
