//! Follow check with a following-list fallback.
//!
//! The viewer-context flag is fast but has been observed to report stale
//! negatives, so a negative answer is re-verified by scanning the user's
//! following list. Either method confirming the relationship is enough.

use crate::error::AllowlistError;
use social_graph_client::SocialGraph;
use tracing::{debug, info, instrument};

/// Largest page the following endpoint serves.
pub const FOLLOWING_PAGE_SIZE: u32 = 150;

/// Hard cap on pages scanned by the fallback.
pub const FOLLOWING_MAX_PAGES: usize = 20;

/// Does `fid` follow `target_fid`?
#[instrument(skip(graph))]
pub async fn check_follow(
    graph: &dyn SocialGraph,
    fid: u64,
    target_fid: u64,
) -> Result<bool, AllowlistError> {
    // Fetch the target with the user as viewer: `following` means the viewer follows the target.
    let via_context = graph
        .user_by_fid(target_fid, Some(fid))
        .await?
        .map(|target| target.followed_by_viewer())
        .unwrap_or(false);

    if via_context {
        debug!(fid, target_fid, "Follow confirmed via viewer context");
        return Ok(true);
    }

    debug!(fid, target_fid, "Viewer context negative, scanning following list");
    let via_list = follows_via_list(graph, fid, target_fid).await?;

    info!(fid, target_fid, following = via_list, "Follow check complete");
    Ok(via_list)
}

/// Scan `fid`'s following list for `target_fid`.
pub async fn follows_via_list(
    graph: &dyn SocialGraph,
    fid: u64,
    target_fid: u64,
) -> Result<bool, AllowlistError> {
    let mut cursor: Option<String> = None;

    for page_number in 1..=FOLLOWING_MAX_PAGES {
        let page = graph
            .following_page(fid, FOLLOWING_PAGE_SIZE, cursor.as_deref())
            .await?;

        debug!(page = page_number, entries = page.users.len(), "Scanned following page");

        if page.contains(target_fid) {
            return Ok(true);
        }

        match page.next_cursor() {
            Some(next) if page.users.len() >= FOLLOWING_PAGE_SIZE as usize => {
                cursor = Some(next.to_string());
            }
            _ => return Ok(false),
        }
    }

    debug!(fid, target_fid, "Page limit reached without finding target");
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use social_graph_client::{FollowEntry, FollowingPage, NextCursor, SocialGraphError, User};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TARGET: u64 = 1118370;

    /// Graph with a fixed viewer-context answer and a paged following list.
    struct FakeGraph {
        viewer_following: bool,
        /// Page index (0-based) containing the target, if any
        target_page: Option<usize>,
        total_pages: usize,
        page_calls: AtomicUsize,
    }

    impl FakeGraph {
        fn new(viewer_following: bool, target_page: Option<usize>, total_pages: usize) -> Self {
            Self {
                viewer_following,
                target_page,
                total_pages,
                page_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SocialGraph for FakeGraph {
        async fn user_by_fid(
            &self,
            fid: u64,
            viewer_fid: Option<u64>,
        ) -> Result<Option<User>, SocialGraphError> {
            assert_eq!(fid, TARGET);
            assert!(viewer_fid.is_some());
            Ok(Some(
                serde_json::from_value(serde_json::json!({
                    "fid": TARGET,
                    "username": "protardio",
                    "viewer_context": { "following": self.viewer_following }
                }))
                .unwrap(),
            ))
        }

        async fn following_page(
            &self,
            _fid: u64,
            limit: u32,
            cursor: Option<&str>,
        ) -> Result<FollowingPage, SocialGraphError> {
            let index = self.page_calls.fetch_add(1, Ordering::SeqCst);
            let expected_cursor = (index > 0).then(|| format!("page-{}", index));
            assert_eq!(cursor.map(str::to_string), expected_cursor);

            let mut users: Vec<FollowEntry> = (0..limit as u64)
                .map(|i| FollowEntry {
                    fid: Some(10_000 + index as u64 * 1000 + i),
                    user: None,
                })
                .collect();
            if self.target_page == Some(index) {
                users[limit as usize / 2].fid = Some(TARGET);
            }

            let next = (index + 1 < self.total_pages).then(|| NextCursor {
                cursor: Some(format!("page-{}", index + 1)),
            });

            Ok(FollowingPage { users, next })
        }

        async fn fid_by_username(&self, _username: &str) -> Result<Option<u64>, SocialGraphError> {
            Ok(Some(TARGET))
        }
    }

    #[tokio::test]
    async fn test_viewer_context_skips_fallback() {
        let graph = FakeGraph::new(true, None, 5);
        assert!(check_follow(&graph, 42, TARGET).await.unwrap());
        assert_eq!(graph.page_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_finds_target_on_later_page() {
        let graph = FakeGraph::new(false, Some(3), 10);
        assert!(check_follow(&graph, 42, TARGET).await.unwrap());
        assert_eq!(graph.page_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_absent_from_all_pages() {
        let graph = FakeGraph::new(false, None, 5);
        assert!(!check_follow(&graph, 42, TARGET).await.unwrap());
        assert_eq!(graph.page_calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_scan_stops_at_page_cap() {
        // Target sits beyond the cap; it must not be found.
        let graph = FakeGraph::new(false, Some(FOLLOWING_MAX_PAGES), 50);
        assert!(!check_follow(&graph, 42, TARGET).await.unwrap());
        assert_eq!(graph.page_calls.load(Ordering::SeqCst), FOLLOWING_MAX_PAGES);
    }

    #[tokio::test]
    async fn test_short_page_ends_scan() {
        struct ShortPage;

        #[async_trait]
        impl SocialGraph for ShortPage {
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
                cursor: Option<&str>,
            ) -> Result<FollowingPage, SocialGraphError> {
                assert!(cursor.is_none(), "scan continued past a short page");
                Ok(FollowingPage {
                    users: vec![FollowEntry {
                        fid: Some(1),
                        user: None,
                    }],
                    next: Some(NextCursor {
                        cursor: Some("more".into()),
                    }),
                })
            }

            async fn fid_by_username(
                &self,
                _username: &str,
            ) -> Result<Option<u64>, SocialGraphError> {
                Ok(None)
            }
        }

        assert!(!check_follow(&ShortPage, 42, TARGET).await.unwrap());
    }
}
