//! In-memory registration registry.

use super::{normalize_wallet, Admission, NewRegistration, Registration};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// In-memory registration registry.
///
/// Indexed by fid, with a secondary index on normalized wallet address.
/// Serializes as a plain list of registrations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Registration>", into = "Vec<Registration>")]
pub struct Registry {
    records: HashMap<u64, Registration>,
    wallets: HashMap<String, u64>,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a registration by fid.
    pub fn get(&self, fid: u64) -> Option<&Registration> {
        self.records.get(&fid)
    }

    /// Get a registration by wallet address (case-insensitive).
    pub fn get_by_wallet(&self, wallet: &str) -> Option<&Registration> {
        self.wallets
            .get(&normalize_wallet(wallet))
            .and_then(|fid| self.records.get(fid))
    }

    /// Number of registrations counted against `tier`.
    pub fn count_tier(&self, tier: &str) -> u64 {
        self.records.values().filter(|r| r.tier == tier).count() as u64
    }

    /// Total number of registrations.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Capacity, identity and wallet checks followed by the insert.
    ///
    /// `cap == 0` means unlimited. The caller must hold exclusive access for
    /// the whole call for the checks to be meaningful.
    pub fn admit(&mut self, entry: NewRegistration, cap: u64) -> Admission {
        if cap > 0 {
            let count = self.count_tier(&entry.tier);
            if count >= cap {
                return Admission::Full { count, cap };
            }
        }

        if let Some(existing) = self.records.get(&entry.fid) {
            return Admission::AlreadyRegistered(existing.clone());
        }

        if self.get_by_wallet(&entry.wallet_address).is_some() {
            return Admission::DuplicateWallet;
        }

        let registration = entry.into_registration(None);
        self.insert(registration.clone());
        Admission::Admitted(registration)
    }

    /// Remove a registration, returning it if present.
    pub fn remove(&mut self, fid: u64) -> Option<Registration> {
        let removed = self.records.remove(&fid)?;
        self.wallets.remove(&normalize_wallet(&removed.wallet_address));
        Some(removed)
    }

    fn insert(&mut self, registration: Registration) {
        self.wallets.insert(
            normalize_wallet(&registration.wallet_address),
            registration.fid,
        );
        self.records.insert(registration.fid, registration);
    }
}

impl From<Vec<Registration>> for Registry {
    fn from(rows: Vec<Registration>) -> Self {
        let mut registry = Registry::new();
        for row in rows {
            registry.insert(row);
        }
        registry
    }
}

impl From<Registry> for Vec<Registration> {
    fn from(registry: Registry) -> Self {
        let mut rows: Vec<Registration> = registry.records.into_values().collect();
        rows.sort_by_key(|r| r.registered_at);
        rows
    }
}
