//! Reputation score check.

use crate::error::AllowlistError;
use social_graph_client::{SocialGraph, User};
use tracing::{debug, instrument};

/// Outcome of a score lookup.
#[derive(Debug, Clone)]
pub struct ScoreReport {
    pub score: f64,
    pub threshold: f64,
    pub meets_threshold: bool,
    pub user: User,
}

/// Fetch the profile for `fid` and compare its score against `threshold`.
///
/// A score equal to the threshold passes. Returns `NotFound` when the
/// social graph has no profile for `fid`.
#[instrument(skip(graph))]
pub async fn check_score(
    graph: &dyn SocialGraph,
    fid: u64,
    threshold: f64,
) -> Result<ScoreReport, AllowlistError> {
    let user = graph
        .user_by_fid(fid, None)
        .await?
        .ok_or_else(|| AllowlistError::NotFound("User not found".into()))?;

    let score = user.reputation_score();
    let meets_threshold = score >= threshold;
    debug!(fid, score, threshold, meets_threshold, "Score evaluated");

    Ok(ScoreReport {
        score,
        threshold,
        meets_threshold,
        user,
    })
}
