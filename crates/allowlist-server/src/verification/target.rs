//! Resolution of the account users must follow.

use crate::error::AllowlistError;
use social_graph_client::SocialGraph;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Resolves the target fid, either from configuration or by username lookup.
///
/// Looked-up values are cached for `ttl`; failed lookups are not cached.
pub struct TargetResolver {
    configured_fid: Option<u64>,
    username: String,
    ttl: Duration,
    cached: RwLock<Option<(u64, Instant)>>,
}

impl TargetResolver {
    pub fn new(configured_fid: Option<u64>, username: impl Into<String>, ttl: Duration) -> Self {
        Self {
            configured_fid: configured_fid.filter(|fid| *fid != 0),
            username: username.into(),
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Username of the target, used for profile links.
    pub fn username(&self) -> &str {
        &self.username
    }

    pub async fn resolve(&self, graph: &dyn SocialGraph) -> Result<u64, AllowlistError> {
        if let Some(fid) = self.configured_fid {
            return Ok(fid);
        }

        if let Some((fid, fetched_at)) = *self.cached.read().await {
            if fetched_at.elapsed() < self.ttl {
                return Ok(fid);
            }
            debug!(fid, "Cached target fid expired");
        }

        let mut cached = self.cached.write().await;
        // Another request may have refreshed it while we waited for the lock.
        if let Some((fid, fetched_at)) = *cached {
            if fetched_at.elapsed() < self.ttl {
                return Ok(fid);
            }
        }

        info!(username = %self.username, "Looking up target fid");
        let fid = graph
            .fid_by_username(&self.username)
            .await?
            .ok_or_else(|| {
                AllowlistError::UpstreamUnavailable(format!("Could not find @{}", self.username))
            })?;

        info!(username = %self.username, fid, "Resolved target fid");
        *cached = Some((fid, Instant::now()));
        Ok(fid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use social_graph_client::{FollowingPage, SocialGraphError, User};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct LookupGraph {
        result: Option<u64>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl SocialGraph for LookupGraph {
        async fn user_by_fid(
            &self,
            _fid: u64,
            _viewer_fid: Option<u64>,
        ) -> Result<Option<User>, SocialGraphError> {
            Ok(None)
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
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.result)
        }
    }

    fn graph(result: Option<u64>) -> LookupGraph {
        LookupGraph {
            result,
            lookups: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_configured_fid_skips_lookup() {
        let graph = graph(Some(5));
        let resolver = TargetResolver::new(Some(1118370), "protardio", Duration::from_secs(60));

        assert_eq!(resolver.resolve(&graph).await.unwrap(), 1118370);
        assert_eq!(graph.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lookup_is_cached_within_ttl() {
        let graph = graph(Some(77));
        let resolver = TargetResolver::new(None, "protardio", Duration::from_secs(60));

        assert_eq!(resolver.resolve(&graph).await.unwrap(), 77);
        assert_eq!(resolver.resolve(&graph).await.unwrap(), 77);
        assert_eq!(graph.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_cache_refreshes() {
        let graph = graph(Some(77));
        let resolver = TargetResolver::new(Some(0), "protardio", Duration::ZERO);

        resolver.resolve(&graph).await.unwrap();
        resolver.resolve(&graph).await.unwrap();
        assert_eq!(graph.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_lookup_not_cached() {
        let graph = graph(None);
        let resolver = TargetResolver::new(None, "nobody", Duration::from_secs(60));

        assert!(matches!(
            resolver.resolve(&graph).await,
            Err(AllowlistError::UpstreamUnavailable(_))
        ));
        assert!(resolver.resolve(&graph).await.is_err());
        assert_eq!(graph.lookups.load(Ordering::SeqCst), 2);
    }
}
