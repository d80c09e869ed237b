//! Admission gate: turns a verified identity into a registration.

use crate::error::AllowlistError;
use crate::registry::{Admission, NewRegistration, Registration, Store};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Capacity and eligibility policy for the current phase.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    /// Minimum reputation score, inclusive
    pub min_score: f64,
    /// Registrations allowed in the current phase; 0 means unlimited
    pub cap: u64,
    /// Phase label new registrations count against
    pub phase: String,
}

impl AdmissionPolicy {
    pub fn meets_threshold(&self, score: f64) -> bool {
        score >= self.min_score
    }
}

/// A registration attempt as submitted by the frame.
#[derive(Debug, Clone, Default)]
pub struct AdmissionRequest {
    pub fid: Option<u64>,
    pub username: Option<String>,
    pub wallet_address: Option<String>,
    pub neynar_score: Option<f64>,
    pub follows_target: bool,
    pub has_shared: bool,
}

/// Capacity snapshot for the current phase.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityReport {
    pub count: u64,
    pub cap: u64,
    pub is_full: bool,
    /// `None` when the phase is unlimited
    pub spots_remaining: Option<u64>,
    pub phase: String,
}

impl CapacityReport {
    pub fn new(count: u64, cap: u64, phase: impl Into<String>) -> Self {
        let limited = cap > 0;
        Self {
            count,
            cap,
            is_full: limited && count >= cap,
            spots_remaining: limited.then(|| cap.saturating_sub(count)),
            phase: phase.into(),
        }
    }
}

/// Guards the registration store against overfill and duplicates.
pub struct AdmissionGate {
    store: Arc<Store>,
    policy: AdmissionPolicy,
}

impl AdmissionGate {
    pub fn new(store: Arc<Store>, policy: AdmissionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Existing registration for `fid`, if any.
    pub async fn lookup(&self, fid: u64) -> Result<Option<Registration>, AllowlistError> {
        self.store.find_by_fid(fid).await
    }

    /// Advisory capacity report; `admit` re-checks atomically.
    pub async fn status(&self) -> Result<CapacityReport, AllowlistError> {
        let count = self.store.count_tier(&self.policy.phase).await?;
        Ok(CapacityReport::new(count, self.policy.cap, &self.policy.phase))
    }

    /// Validate the request, then admit it.
    #[instrument(skip(self, request), fields(fid = ?request.fid))]
    pub async fn admit(&self, request: AdmissionRequest) -> Result<Registration, AllowlistError> {
        let entry = self.validate(request)?;
        let fid = entry.fid;

        match self.store.admit(entry, self.policy.cap).await? {
            Admission::Admitted(registration) => {
                info!(fid, tier = %registration.tier, "Registration admitted");
                Ok(registration)
            }
            Admission::Full { count, cap } => {
                warn!(fid, count, cap, "Allowlist full, registration rejected");
                Err(AllowlistError::CapacityExceeded { count, cap })
            }
            Admission::AlreadyRegistered(existing) => {
                info!(fid, "Identity already registered");
                Err(AllowlistError::AlreadyRegistered(Box::new(existing)))
            }
            Admission::DuplicateWallet => {
                warn!(fid, "Wallet already registered to another identity");
                Err(AllowlistError::DuplicateWallet(
                    "wallet bound to another registration".into(),
                ))
            }
        }
    }

    /// Field, threshold and checklist validation, in that order.
    fn validate(&self, request: AdmissionRequest) -> Result<NewRegistration, AllowlistError> {
        let fid = request.fid.filter(|fid| *fid != 0);
        let username = request.username.filter(|u| !u.trim().is_empty());
        let wallet = request.wallet_address.filter(|w| !w.trim().is_empty());

        let (Some(fid), Some(username), Some(wallet)) = (fid, username, wallet) else {
            return Err(AllowlistError::Validation("Missing required fields".into()));
        };

        let score = request.neynar_score.unwrap_or(0.0);
        if !self.policy.meets_threshold(score) {
            return Err(AllowlistError::ThresholdNotMet {
                score,
                threshold: self.policy.min_score,
            });
        }

        if !request.follows_target {
            return Err(AllowlistError::FollowRequired);
        }

        if !request.has_shared {
            return Err(AllowlistError::ShareRequired);
        }

        Ok(NewRegistration::new(
            fid,
            username,
            &wallet,
            score,
            self.policy.phase.clone(),
        ))
    }
}
