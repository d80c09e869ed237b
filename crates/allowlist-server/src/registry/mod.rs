//! Registration records and their storage backends.

mod memory;
mod rest;
mod store;

pub use memory::Registry;
pub use rest::RestStore;
pub use store::{MemoryStore, Store};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review status of a registration.
///
/// Always `Pending` at creation; transitions happen outside this service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

/// A persisted allowlist registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Registration {
    /// Store-assigned identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Social platform identity id
    pub fid: u64,

    /// Handle at registration time (display only)
    pub username: String,

    /// Lower-cased wallet address
    pub wallet_address: String,

    /// Reputation score at registration time
    pub neynar_score: f64,

    /// Stored as `follows_protardio` in tables created before the rename
    #[serde(alias = "follows_protardio")]
    pub follows_target: bool,

    pub has_shared: bool,

    pub registered_at: DateTime<Utc>,

    /// Phase label this registration counts against
    pub tier: String,

    pub status: RegistrationStatus,
}

/// Fields of a registration about to be admitted.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewRegistration {
    pub fid: u64,
    pub username: String,
    pub wallet_address: String,
    pub neynar_score: f64,
    pub tier: String,
}

impl NewRegistration {
    /// Build a new entry, normalizing the wallet address.
    pub fn new(
        fid: u64,
        username: impl Into<String>,
        wallet_address: &str,
        neynar_score: f64,
        tier: impl Into<String>,
    ) -> Self {
        Self {
            fid,
            username: username.into(),
            wallet_address: normalize_wallet(wallet_address),
            neynar_score,
            tier: tier.into(),
        }
    }

    /// Materialize the row as stored: pending, both checks marked done.
    pub fn into_registration(self, id: Option<String>) -> Registration {
        Registration {
            id,
            fid: self.fid,
            username: self.username,
            wallet_address: self.wallet_address,
            neynar_score: self.neynar_score,
            follows_target: true,
            has_shared: true,
            registered_at: Utc::now(),
            tier: self.tier,
            status: RegistrationStatus::Pending,
        }
    }
}

/// Result of an atomic admission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Admitted(Registration),
    Full { count: u64, cap: u64 },
    AlreadyRegistered(Registration),
    DuplicateWallet,
}

/// Canonical form of a wallet address for storage and comparison.
pub fn normalize_wallet(address: &str) -> String {
    address.trim().to_lowercase()
}
