//! Client for the Farcaster social-graph API.
//!
//! Covers the three lookups the allowlist needs: profiles (with optional
//! viewer context), following lists and username resolution.

mod client;
mod error;
mod types;

pub use client::{SocialGraph, SocialGraphClient, DEFAULT_API_URL};
pub use error::SocialGraphError;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_client(mock_server: &MockServer) -> SocialGraphClient {
        SocialGraphClient::new("test-api-key", mock_server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_user_by_fid_with_viewer_context() {
        let mock_server = MockServer::start().await;

        let body = serde_json::json!({
            "users": [{
                "fid": 1118370,
                "username": "protardio",
                "display_name": "Protardio",
                "follower_count": 4200,
                "viewer_context": { "following": true, "followed_by": false }
            }]
        });

        Mock::given(method("GET"))
            .and(path("/user/bulk"))
            .and(query_param("fids", "1118370"))
            .and(query_param("viewer_fid", "42"))
            .and(header("x-api-key", "test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let user = client.user_by_fid(1118370, Some(42)).await.unwrap().unwrap();

        assert_eq!(user.username, "protardio");
        assert!(user.followed_by_viewer());
    }

    #[tokio::test]
    async fn test_user_by_fid_empty() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user/bulk"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "users": [] })),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        assert!(client.user_by_fid(7, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_following_page_passes_cursor() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/following"))
            .and(query_param("fid", "42"))
            .and(query_param("limit", "150"))
            .and(query_param("cursor", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "users": [{ "user": { "fid": 9 } }],
                "next": { "cursor": "def" }
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let page = client.following_page(42, 150, Some("abc")).await.unwrap();

        assert!(page.contains(9));
        assert_eq!(page.next_cursor(), Some("def"));
    }

    #[tokio::test]
    async fn test_fid_by_username() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user/by_username"))
            .and(query_param("username", "protardio"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "user": { "fid": 1118370, "username": "protardio" }
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        assert_eq!(
            client.fid_by_username("protardio").await.unwrap(),
            Some(1118370)
        );
    }

    #[tokio::test]
    async fn test_fid_by_username_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user/by_username"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        assert_eq!(client.fid_by_username("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user/bulk"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let result = client.user_by_fid(1, None).await;
        assert!(matches!(result, Err(SocialGraphError::RateLimit)));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/following"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let result = client.following_page(1, 150, None).await;
        assert!(matches!(result, Err(SocialGraphError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_api_error_carries_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user/bulk"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        match client.user_by_fid(1, None).await {
            Err(SocialGraphError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected result: {:?}", other.map(|u| u.map(|u| u.fid))),
        }
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client =
            SocialGraphClient::new("k", "http://localhost:9999/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9999");
    }
}
