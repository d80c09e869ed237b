//! Request and response types for the social graph API.

use serde::{Deserialize, Serialize};

/// Follower count at which the approximated score saturates.
const FOLLOWER_SCORE_DIVISOR: f64 = 10_000.0;

/// Ceiling for scores approximated from follower count alone.
const FOLLOWER_SCORE_CAP: f64 = 0.9;

/// A user profile as returned by `/user/bulk`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub fid: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub pfp_url: Option<String>,
    #[serde(default)]
    pub custody_address: Option<String>,
    #[serde(default)]
    pub verified_addresses: VerifiedAddresses,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub power_badge: bool,
    #[serde(default)]
    pub experimental: Option<Experimental>,
    /// Only present when the request carried a `viewer_fid`.
    #[serde(default)]
    pub viewer_context: Option<ViewerContext>,
}

impl User {
    /// Reputation score for this user.
    ///
    /// Uses the API-provided `neynar_user_score` when present. Otherwise a
    /// power badge counts as 1.0 and everyone else is approximated from
    /// follower count, capped at 0.9 and rounded to two decimals.
    pub fn reputation_score(&self) -> f64 {
        if let Some(score) = self
            .experimental
            .as_ref()
            .and_then(|e| e.neynar_user_score)
        {
            return score;
        }

        if self.power_badge {
            return 1.0;
        }

        let approx = (self.follower_count as f64 / FOLLOWER_SCORE_DIVISOR).min(FOLLOWER_SCORE_CAP);
        (approx * 100.0).round() / 100.0
    }

    /// Whether the viewer follows this user, per `viewer_context`.
    pub fn followed_by_viewer(&self) -> bool {
        self.viewer_context
            .as_ref()
            .map(|ctx| ctx.following)
            .unwrap_or(false)
    }

    /// Wallet preferred for allowlisting: first verified address, else custody.
    pub fn primary_wallet(&self) -> Option<&str> {
        self.verified_addresses
            .eth_addresses
            .first()
            .map(String::as_str)
            .or(self.custody_address.as_deref())
            .filter(|addr| !addr.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifiedAddresses {
    #[serde(default)]
    pub eth_addresses: Vec<String>,
    #[serde(default)]
    pub sol_addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Experimental {
    #[serde(default)]
    pub neynar_user_score: Option<f64>,
}

/// Relationship flags relative to the requesting viewer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerContext {
    /// Does the viewer follow this user?
    #[serde(default)]
    pub following: bool,
    /// Does this user follow the viewer?
    #[serde(default)]
    pub followed_by: bool,
    #[serde(default)]
    pub blocking: bool,
    #[serde(default)]
    pub blocked_by: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkUsersResponse {
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserByUsernameResponse {
    pub user: Option<UserRef>,
}

/// Minimal user reference carrying only the fid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub fid: u64,
}

/// One entry of a following list.
///
/// Depending on API version the followed fid is either at the top level or
/// nested under `user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowEntry {
    #[serde(default)]
    pub fid: Option<u64>,
    #[serde(default)]
    pub user: Option<UserRef>,
}

impl FollowEntry {
    pub fn fid(&self) -> Option<u64> {
        self.fid.or_else(|| self.user.as_ref().map(|u| u.fid))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NextCursor {
    #[serde(default)]
    pub cursor: Option<String>,
}

/// One page of `/following`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FollowingPage {
    #[serde(default)]
    pub users: Vec<FollowEntry>,
    #[serde(default)]
    pub next: Option<NextCursor>,
}

impl FollowingPage {
    /// Cursor for the next page, if the API reported one.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next
            .as_ref()
            .and_then(|n| n.cursor.as_deref())
            .filter(|c| !c.is_empty())
    }

    pub fn contains(&self, fid: u64) -> bool {
        self.users.iter().any(|entry| entry.fid() == Some(fid))
    }
}
