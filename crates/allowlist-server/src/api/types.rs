//! API request and response types.

use crate::gate::{AdmissionRequest, CapacityReport};
use crate::registry::Registration;
use serde::{Deserialize, Serialize};
use social_graph_client::User;

/// Query for `/api/check-registration`.
///
/// `fid` stays a string so a malformed value surfaces as a validation
/// error instead of a bare extractor rejection.
#[derive(Debug, Deserialize)]
pub struct CheckRegistrationQuery {
    pub fid: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRegistrationResponse {
    pub success: bool,
    pub is_registered: bool,
    pub registration: Option<Registration>,
}

/// Registration submitted by the frame.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub fid: Option<u64>,
    pub username: Option<String>,
    pub wallet_address: Option<String>,
    pub neynar_score: Option<f64>,
    #[serde(rename = "followsProtardio")]
    pub follows_target: bool,
    pub has_shared: bool,
}

impl From<RegisterRequest> for AdmissionRequest {
    fn from(req: RegisterRequest) -> Self {
        AdmissionRequest {
            fid: req.fid,
            username: req.username,
            wallet_address: req.wallet_address,
            neynar_score: req.neynar_score,
            follows_target: req.follows_target,
            has_shared: req.has_shared,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub registration: Registration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStatusResponse {
    pub success: bool,
    pub count: u64,
    pub cap: u64,
    pub is_full: bool,
    pub spots_remaining: Option<u64>,
    pub phase: String,
}

impl From<CapacityReport> for RegistrationStatusResponse {
    fn from(report: CapacityReport) -> Self {
        Self {
            success: true,
            count: report.count,
            cap: report.cap,
            is_full: report.is_full,
            spots_remaining: report.spots_remaining,
            phase: report.phase,
        }
    }
}

/// Body of the verify endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FidRequest {
    pub fid: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyFollowResponse {
    pub success: bool,
    pub is_following: bool,
    #[serde(rename = "protardioFid")]
    pub target_fid: u64,
    pub viewer_fid: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyScoreResponse {
    pub success: bool,
    pub score: f64,
    pub meets_threshold: bool,
    pub threshold: f64,
    pub user: ScoreUser,
}

/// Profile summary returned alongside a score.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUser {
    pub username: String,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
    pub custody_address: Option<String>,
    pub verified_addresses: Vec<String>,
}

impl From<User> for ScoreUser {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            display_name: user.display_name,
            pfp_url: user.pfp_url,
            custody_address: user.custody_address,
            verified_addresses: user.verified_addresses.eth_addresses,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub phase: String,
    pub store: String,
}
