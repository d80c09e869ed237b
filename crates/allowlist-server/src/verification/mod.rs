//! Eligibility checks and the flow that sequences them.

mod follow;
mod orchestrator;
mod score;
mod target;

pub use follow::{check_follow, follows_via_list, FOLLOWING_MAX_PAGES, FOLLOWING_PAGE_SIZE};
pub use orchestrator::{ConnectOutcome, FlowSettings, VerificationOrchestrator, VerificationSession};
pub use score::{check_score, ScoreReport};
pub use target::TargetResolver;

use std::fmt;

/// Why a check did not pass.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckFailure {
    BelowThreshold { score: f64, threshold: f64 },
    NotFound,
    NotFollowing,
    Upstream(String),
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckFailure::BelowThreshold { score, threshold } => {
                write!(f, "Score {} below {} threshold", score, threshold)
            }
            CheckFailure::NotFound => write!(f, "User not found"),
            CheckFailure::NotFollowing => write!(f, "Must follow the target account to register"),
            CheckFailure::Upstream(msg) => write!(f, "Verification failed: {}", msg),
        }
    }
}

/// State of a single check.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CheckState {
    #[default]
    Idle,
    Checking,
    Passed,
    Failed(CheckFailure),
}

impl CheckState {
    pub fn is_passed(&self) -> bool {
        matches!(self, CheckState::Passed)
    }
}

/// The three eligibility checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Checklist {
    pub score: CheckState,
    pub follow: CheckState,
    pub share: CheckState,
}

impl Checklist {
    pub fn can_register(&self) -> bool {
        self.score.is_passed() && self.follow.is_passed() && self.share.is_passed()
    }
}
