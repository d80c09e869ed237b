//! Error types for the allowlist service.

use crate::registry::Registration;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use social_graph_client::SocialGraphError;
use thiserror::Error;
use tracing::error;

/// Allowlist error types.
#[derive(Debug, Error)]
pub enum AllowlistError {
    #[error("{0}")]
    Validation(String),

    #[error("Score {score} below threshold {threshold}")]
    ThresholdNotMet { score: f64, threshold: f64 },

    #[error("Must follow the target account")]
    FollowRequired,

    #[error("Must share registration")]
    ShareRequired,

    #[error("Already registered")]
    AlreadyRegistered(Box<Registration>),

    #[error("Wallet address already registered: {0}")]
    DuplicateWallet(String),

    #[error("Allowlist is full ({count}/{cap})")]
    CapacityExceeded { count: u64, cap: u64 },

    #[error("{0}")]
    NotFound(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Storage error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AllowlistError {
    /// Stable machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            AllowlistError::Validation(_) => "VALIDATION_ERROR",
            AllowlistError::ThresholdNotMet { .. } => "THRESHOLD_NOT_MET",
            AllowlistError::FollowRequired => "FOLLOW_REQUIRED",
            AllowlistError::ShareRequired => "SHARE_REQUIRED",
            AllowlistError::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            AllowlistError::DuplicateWallet(_) => "DUPLICATE_WALLET",
            AllowlistError::CapacityExceeded { .. } => "ALLOWLIST_FULL",
            AllowlistError::NotFound(_) => "NOT_FOUND",
            AllowlistError::UpstreamUnavailable(_) | AllowlistError::NotConfigured(_) => {
                "UPSTREAM_UNAVAILABLE"
            }
            AllowlistError::Store(_) => "STORE_ERROR",
            AllowlistError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AllowlistError::Validation(_)
            | AllowlistError::ThresholdNotMet { .. }
            | AllowlistError::FollowRequired
            | AllowlistError::ShareRequired
            | AllowlistError::DuplicateWallet(_) => StatusCode::BAD_REQUEST,
            // Conflict on identity is reported success-shaped so the frame can branch on it.
            AllowlistError::AlreadyRegistered(_) => StatusCode::OK,
            AllowlistError::CapacityExceeded { .. } => StatusCode::FORBIDDEN,
            AllowlistError::NotFound(_) => StatusCode::NOT_FOUND,
            AllowlistError::UpstreamUnavailable(_)
            | AllowlistError::NotConfigured(_)
            | AllowlistError::Store(_)
            | AllowlistError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the user.
    fn public_message(&self) -> String {
        match self {
            AllowlistError::UpstreamUnavailable(_) => "Verification service unavailable".to_string(),
            AllowlistError::NotConfigured(_) => "API configuration error".to_string(),
            AllowlistError::Store(_) => "Database error".to_string(),
            AllowlistError::Internal(_) => "Request failed".to_string(),
            AllowlistError::DuplicateWallet(_) => "Wallet address already registered".to_string(),
            other => other.to_string(),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_full: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_registered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<Registration>,
}

impl IntoResponse for AllowlistError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(code = self.code(), detail = %self, "Request failed");
        }

        let mut body = ErrorResponse {
            success: false,
            error: self.public_message(),
            code: self.code().to_string(),
            is_full: None,
            count: None,
            cap: None,
            already_registered: None,
            registration: None,
        };

        match self {
            AllowlistError::CapacityExceeded { count, cap } => {
                body.is_full = Some(true);
                body.count = Some(count);
                body.cap = Some(cap);
            }
            AllowlistError::AlreadyRegistered(existing) => {
                body.already_registered = Some(true);
                body.registration = Some(*existing);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

impl From<SocialGraphError> for AllowlistError {
    fn from(e: SocialGraphError) -> Self {
        AllowlistError::UpstreamUnavailable(e.to_string())
    }
}

impl From<std::io::Error> for AllowlistError {
    fn from(e: std::io::Error) -> Self {
        AllowlistError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for AllowlistError {
    fn from(e: serde_json::Error) -> Self {
        AllowlistError::Store(format!("JSON serialization error: {}", e))
    }
}

impl From<reqwest::Error> for AllowlistError {
    fn from(e: reqwest::Error) -> Self {
        AllowlistError::Store(e.to_string())
    }
}
