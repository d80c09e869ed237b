//! Verification flow: score, follow, share, then admission.
//!
//! The share step is client-trusted. Opening the composer plus a fixed
//! pause is all that happens; nothing confirms the post server-side.

use super::{check_follow, check_score, CheckFailure, CheckState, Checklist, TargetResolver};
use crate::config::{AllowlistConfig, FlowConfig};
use crate::error::AllowlistError;
use crate::gate::{AdmissionGate, AdmissionRequest};
use crate::identity::{self, Identity, IdentityProvider};
use crate::registry::Registration;
use social_graph_client::SocialGraph;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// Timings and links used by the flow.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub share_delay: Duration,
    pub follow_recheck_delay: Duration,
    pub compose_url: String,
    pub profile_url: String,
    pub share_text: String,
    pub app_url: Option<String>,
}

impl FlowSettings {
    pub fn from_config(flow: &FlowConfig, allowlist: &AllowlistConfig) -> Self {
        Self {
            share_delay: flow.share_delay,
            follow_recheck_delay: flow.follow_recheck_delay,
            compose_url: flow.compose_url.clone(),
            profile_url: flow.profile_url.clone(),
            share_text: flow.share_text.clone(),
            app_url: allowlist.app_url.clone(),
        }
    }
}

/// Per-user progress through the checklist.
#[derive(Debug, Clone)]
pub struct VerificationSession {
    pub identity: Identity,
    pub checklist: Checklist,
    /// Score observed by the last score check
    pub score: Option<f64>,
    /// Wallet that will be registered
    pub wallet: Option<String>,
}

impl VerificationSession {
    pub fn new(identity: Identity) -> Self {
        let wallet = identity.wallet().map(str::to_string);
        Self {
            identity,
            checklist: Checklist::default(),
            score: None,
            wallet,
        }
    }
}

/// Result of connecting a user.
#[derive(Debug)]
pub enum ConnectOutcome {
    /// The user declined sign-in.
    SignedOut,
    AlreadyRegistered {
        identity: Identity,
        registration: Registration,
    },
    Verifying(VerificationSession),
}

/// Drives a user from sign-in to an admit/deny decision.
pub struct VerificationOrchestrator {
    graph: Arc<dyn SocialGraph>,
    identity: Arc<dyn IdentityProvider>,
    gate: Arc<AdmissionGate>,
    targets: Arc<TargetResolver>,
    settings: FlowSettings,
}

impl VerificationOrchestrator {
    pub fn new(
        graph: Arc<dyn SocialGraph>,
        identity: Arc<dyn IdentityProvider>,
        gate: Arc<AdmissionGate>,
        targets: Arc<TargetResolver>,
        settings: FlowSettings,
    ) -> Self {
        Self {
            graph,
            identity,
            gate,
            targets,
            settings,
        }
    }

    /// Sign in, short-circuit if already registered, then run score and follow.
    pub async fn connect(&self) -> Result<ConnectOutcome, AllowlistError> {
        let Some(user) = identity::connect(self.identity.as_ref()).await? else {
            return Ok(ConnectOutcome::SignedOut);
        };

        if let Some(registration) = self.gate.lookup(user.fid).await? {
            info!(fid = user.fid, "User already registered");
            return Ok(ConnectOutcome::AlreadyRegistered {
                identity: user,
                registration,
            });
        }

        let mut session = VerificationSession::new(user);
        if self.check_score(&mut session).await {
            self.check_follow(&mut session).await;
        }

        Ok(ConnectOutcome::Verifying(session))
    }

    /// Run the score check, returning whether it passed.
    #[instrument(skip(self, session), fields(fid = session.identity.fid))]
    pub async fn check_score(&self, session: &mut VerificationSession) -> bool {
        session.checklist.score = CheckState::Checking;
        let threshold = self.gate.policy().min_score;

        session.checklist.score =
            match check_score(self.graph.as_ref(), session.identity.fid, threshold).await {
                Ok(report) => {
                    session.score = Some(report.score);
                    if report.meets_threshold {
                        let profile = report.user;
                        if !profile.username.is_empty() {
                            session.identity.username = profile.username.clone();
                        }
                        session.identity.display_name = profile.display_name.clone();
                        session.identity.pfp_url = profile.pfp_url.clone();
                        if let Some(wallet) = profile.primary_wallet() {
                            session.wallet = Some(wallet.to_string());
                        }
                        CheckState::Passed
                    } else {
                        CheckState::Failed(CheckFailure::BelowThreshold {
                            score: report.score,
                            threshold,
                        })
                    }
                }
                Err(AllowlistError::NotFound(_)) => CheckState::Failed(CheckFailure::NotFound),
                Err(e) => {
                    warn!(error = %e, "Score check failed");
                    CheckState::Failed(CheckFailure::Upstream(e.to_string()))
                }
            };

        session.checklist.score.is_passed()
    }

    /// Run the follow check, returning whether it passed.
    #[instrument(skip(self, session), fields(fid = session.identity.fid))]
    pub async fn check_follow(&self, session: &mut VerificationSession) -> bool {
        session.checklist.follow = CheckState::Checking;

        session.checklist.follow = match self.follows_target(session.identity.fid).await {
            Ok(true) => CheckState::Passed,
            Ok(false) => CheckState::Failed(CheckFailure::NotFollowing),
            Err(e) => {
                warn!(error = %e, "Follow check failed");
                CheckState::Failed(CheckFailure::Upstream(e.to_string()))
            }
        };

        session.checklist.follow.is_passed()
    }

    async fn follows_target(&self, fid: u64) -> Result<bool, AllowlistError> {
        let target = self.targets.resolve(self.graph.as_ref()).await?;
        check_follow(self.graph.as_ref(), fid, target).await
    }

    /// Open the share composer, wait, and mark the share done.
    pub async fn share(&self, session: &mut VerificationSession) {
        let url = identity::compose_url(
            &self.settings.compose_url,
            &self.settings.share_text,
            self.settings.app_url.as_deref(),
        );

        if let Err(e) = self.identity.open_url(&url).await {
            warn!(error = %e, "Failed to open share composer");
        }

        session.checklist.share = CheckState::Checking;
        sleep(self.settings.share_delay).await;
        session.checklist.share = CheckState::Passed;
    }

    /// Send the user to the target's profile, then re-check once.
    pub async fn follow_redirect(&self, session: &mut VerificationSession) -> bool {
        let url = identity::profile_url(&self.settings.profile_url, self.targets.username());

        if let Err(e) = self.identity.open_url(&url).await {
            warn!(error = %e, "Failed to open target profile");
        }

        sleep(self.settings.follow_recheck_delay).await;
        self.check_follow(session).await
    }

    /// Hand a session to the admission gate.
    ///
    /// Checklist state maps onto the request flags, so an incomplete
    /// checklist is rejected by the gate with the matching error.
    pub async fn submit(
        &self,
        session: &VerificationSession,
    ) -> Result<Registration, AllowlistError> {
        let request = AdmissionRequest {
            fid: Some(session.identity.fid),
            username: Some(session.identity.handle()),
            wallet_address: session.wallet.clone(),
            neynar_score: session
                .checklist
                .score
                .is_passed()
                .then_some(session.score)
                .flatten(),
            follows_target: session.checklist.follow.is_passed(),
            has_shared: session.checklist.share.is_passed(),
        };

        self.gate.admit(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::AdmissionPolicy;
    use crate::registry::Store;
    use async_trait::async_trait;
    use social_graph_client::{FollowingPage, SocialGraphError, User};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    const TARGET: u64 = 1118370;

    struct FakeGraph {
        scores: HashMap<u64, f64>,
        following: AtomicBool,
    }

    #[async_trait]
    impl SocialGraph for FakeGraph {
        async fn user_by_fid(
            &self,
            fid: u64,
            viewer_fid: Option<u64>,
        ) -> Result<Option<User>, SocialGraphError> {
            if fid == TARGET {
                let following = viewer_fid.is_some() && self.following.load(Ordering::SeqCst);
                return Ok(Some(
                    serde_json::from_value(serde_json::json!({
                        "fid": TARGET,
                        "username": "protardio",
                        "viewer_context": { "following": following }
                    }))
                    .unwrap(),
                ));
            }

            Ok(self.scores.get(&fid).map(|score| {
                serde_json::from_value(serde_json::json!({
                    "fid": fid,
                    "username": format!("user{fid}"),
                    "display_name": "User",
                    "custody_address": format!("0xCUSTODY{fid}"),
                    "verified_addresses": { "eth_addresses": [format!("0xVERIFIED{fid}")] },
                    "experimental": { "neynar_user_score": score }
                }))
                .unwrap()
            }))
        }

        async fn following_page(
            &self,
            _fid: u64,
            _limit: u32,
            _cursor: Option<&str>,
        ) -> Result<FollowingPage, SocialGraphError> {
            Ok(FollowingPage::default())
        }

        async fn fid_by_username(&self, _username: &str) -> Result<Option<u64>, SocialGraphError> {
            Ok(Some(TARGET))
        }
    }

    struct FakeProvider {
        user: Option<Identity>,
        opened: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn context_user(&self) -> Option<Identity> {
            self.user.clone()
        }

        async fn sign_in(&self, _nonce: &str) -> Result<Option<Identity>, AllowlistError> {
            Ok(None)
        }

        async fn open_url(&self, url: &str) -> Result<(), AllowlistError> {
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    struct Harness {
        orchestrator: VerificationOrchestrator,
        graph: Arc<FakeGraph>,
        provider: Arc<FakeProvider>,
        gate: Arc<AdmissionGate>,
    }

    fn harness(fid: Option<u64>, score: f64, following: bool, cap: u64) -> Harness {
        let user = fid.map(|fid| Identity {
            fid,
            username: format!("user{fid}"),
            ..Default::default()
        });
        harness_for(user, score, following, cap)
    }

    fn harness_for(user: Option<Identity>, score: f64, following: bool, cap: u64) -> Harness {
        let graph = Arc::new(FakeGraph {
            scores: user.iter().map(|u| (u.fid, score)).collect(),
            following: AtomicBool::new(following),
        });
        let provider = Arc::new(FakeProvider {
            user,
            opened: Mutex::new(Vec::new()),
        });
        let gate = Arc::new(AdmissionGate::new(
            Arc::new(Store::memory()),
            AdmissionPolicy {
                min_score: 0.5,
                cap,
                phase: "phase1_tier3".into(),
            },
        ));
        let settings = FlowSettings {
            share_delay: Duration::ZERO,
            follow_recheck_delay: Duration::ZERO,
            compose_url: "https://warpcast.com/~/compose".into(),
            profile_url: "https://warpcast.com".into(),
            share_text: "Join".into(),
            app_url: Some("https://allowlist.example".into()),
        };

        let orchestrator = VerificationOrchestrator::new(
            graph.clone(),
            provider.clone(),
            gate.clone(),
            Arc::new(TargetResolver::new(
                None,
                "protardio",
                Duration::from_secs(60),
            )),
            settings,
        );

        Harness {
            orchestrator,
            graph,
            provider,
            gate,
        }
    }

    fn verifying(outcome: ConnectOutcome) -> VerificationSession {
        match outcome {
            ConnectOutcome::Verifying(session) => session,
            other => panic!("expected Verifying, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_admission() {
        let h = harness(Some(42), 0.8, true, 100);

        let mut session = verifying(h.orchestrator.connect().await.unwrap());
        assert_eq!(session.checklist.score, CheckState::Passed);
        assert_eq!(session.checklist.follow, CheckState::Passed);
        assert_eq!(session.wallet.as_deref(), Some("0xVERIFIED42"));
        assert!(!session.checklist.can_register());

        h.orchestrator.share(&mut session).await;
        assert!(session.checklist.can_register());
        assert_eq!(
            h.provider.opened.lock().unwrap().as_slice(),
            ["https://warpcast.com/~/compose?text=Join&embeds[]=https%3A%2F%2Fallowlist.example"]
        );

        let registration = h.orchestrator.submit(&session).await.unwrap();
        assert_eq!(registration.fid, 42);
        assert_eq!(registration.wallet_address, "0xverified42");
        assert_eq!(registration.neynar_score, 0.8);
        assert_eq!(h.gate.status().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_connect_detects_existing_registration() {
        let h = harness(Some(42), 0.8, true, 0);

        let mut session = verifying(h.orchestrator.connect().await.unwrap());
        h.orchestrator.share(&mut session).await;
        h.orchestrator.submit(&session).await.unwrap();

        match h.orchestrator.connect().await.unwrap() {
            ConnectOutcome::AlreadyRegistered { registration, .. } => {
                assert_eq!(registration.fid, 42)
            }
            other => panic!("expected AlreadyRegistered, got {:?}", other),
        }
    }

    #[test]
    fn test_settings_from_config() {
        let allowlist = AllowlistConfig {
            app_url: Some("https://allowlist.example".into()),
            ..Default::default()
        };
        let settings = FlowSettings::from_config(&FlowConfig::default(), &allowlist);

        assert_eq!(settings.share_delay, Duration::from_millis(2500));
        assert_eq!(settings.follow_recheck_delay, Duration::from_secs(3));
        assert_eq!(settings.app_url.as_deref(), Some("https://allowlist.example"));
    }

    #[tokio::test]
    async fn test_signed_out() {
        let h = harness(None, 0.0, false, 0);
        assert!(matches!(
            h.orchestrator.connect().await.unwrap(),
            ConnectOutcome::SignedOut
        ));
    }

    #[tokio::test]
    async fn test_low_score_skips_follow_and_blocks_submit() {
        let h = harness(Some(42), 0.3, true, 0);

        let mut session = verifying(h.orchestrator.connect().await.unwrap());
        assert_eq!(
            session.checklist.score,
            CheckState::Failed(CheckFailure::BelowThreshold {
                score: 0.3,
                threshold: 0.5
            })
        );
        assert_eq!(session.checklist.follow, CheckState::Idle);

        // Wallet is only taken from the profile once the score passes.
        assert_eq!(session.wallet, None);
        h.orchestrator.share(&mut session).await;
        assert!(matches!(
            h.orchestrator.submit(&session).await,
            Err(AllowlistError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_low_score_with_wallet_fails_threshold() {
        let user = Identity {
            fid: 42,
            username: "user42".into(),
            custody_address: Some("0xCustody42".into()),
            ..Default::default()
        };
        let h = harness_for(Some(user), 0.3, true, 0);

        let mut session = verifying(h.orchestrator.connect().await.unwrap());
        assert_eq!(session.wallet.as_deref(), Some("0xCustody42"));

        h.orchestrator.share(&mut session).await;
        assert!(matches!(
            h.orchestrator.submit(&session).await,
            Err(AllowlistError::ThresholdNotMet { score, threshold })
                if score == 0.0 && threshold == 0.5
        ));
        assert_eq!(h.gate.status().await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_follow_redirect_rechecks_once() {
        let h = harness(Some(42), 0.8, false, 0);

        let mut session = verifying(h.orchestrator.connect().await.unwrap());
        assert_eq!(
            session.checklist.follow,
            CheckState::Failed(CheckFailure::NotFollowing)
        );

        // User follows in the host client while we wait.
        h.graph.following.store(true, Ordering::SeqCst);
        assert!(h.orchestrator.follow_redirect(&mut session).await);
        assert_eq!(session.checklist.follow, CheckState::Passed);
        assert_eq!(
            h.provider.opened.lock().unwrap().as_slice(),
            ["https://warpcast.com/protardio"]
        );
    }

    #[tokio::test]
    async fn test_submit_without_share_rejected() {
        let h = harness(Some(42), 0.8, true, 0);

        let session = verifying(h.orchestrator.connect().await.unwrap());
        assert!(matches!(
            h.orchestrator.submit(&session).await,
            Err(AllowlistError::ShareRequired)
        ));
    }

    #[tokio::test]
    async fn test_full_allowlist_rejects_submit() {
        let h = harness(Some(42), 0.8, true, 1);
        h.gate
            .admit(AdmissionRequest {
                fid: Some(7),
                username: Some("early".into()),
                wallet_address: Some("0xearly".into()),
                neynar_score: Some(0.9),
                follows_target: true,
                has_shared: true,
            })
            .await
            .unwrap();

        let mut session = verifying(h.orchestrator.connect().await.unwrap());
        h.orchestrator.share(&mut session).await;
        assert!(matches!(
            h.orchestrator.submit(&session).await,
            Err(AllowlistError::CapacityExceeded { count: 1, cap: 1 })
        ));
    }
}
