//! Social graph HTTP client.

use crate::error::SocialGraphError;
use crate::types::*;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default social graph API base URL.
pub const DEFAULT_API_URL: &str = "https://api.neynar.com/v2/farcaster";

/// Queries the social graph needs to answer for eligibility checks.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// Fetch a single profile, optionally with viewer context.
    async fn user_by_fid(
        &self,
        fid: u64,
        viewer_fid: Option<u64>,
    ) -> Result<Option<User>, SocialGraphError>;

    /// Fetch one page of the accounts `fid` follows.
    async fn following_page(
        &self,
        fid: u64,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<FollowingPage, SocialGraphError>;

    /// Resolve a username to its fid.
    async fn fid_by_username(&self, username: &str) -> Result<Option<u64>, SocialGraphError>;
}

/// Social graph API client.
///
/// The API key is stored using `SecretString` to prevent accidental
/// exposure in logs or debug output.
#[derive(Clone)]
pub struct SocialGraphClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl SocialGraphClient {
    /// Create a new social graph client.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SocialGraphError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: SecretString::new(api_key.into()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch profiles for several fids in one request.
    #[instrument(skip(self), fields(count = fids.len()))]
    pub async fn users_bulk(
        &self,
        fids: &[u64],
        viewer_fid: Option<u64>,
    ) -> Result<Vec<User>, SocialGraphError> {
        let fids = fids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let mut query = vec![("fids", fids)];
        if let Some(viewer) = viewer_fid {
            query.push(("viewer_fid", viewer.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/user/bulk", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("accept", "application/json")
            .query(&query)
            .send()
            .await?;

        self.handle_response::<BulkUsersResponse>(response)
            .await
            .map(|r| r.users)
    }

    /// Handle HTTP response, converting errors appropriately.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, SocialGraphError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            debug!(
                "Response body: {}",
                body.chars().take(200).collect::<String>()
            );
            serde_json::from_str(&body).map_err(SocialGraphError::from)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract error information from failed response.
    async fn extract_error(&self, response: reqwest::Response) -> SocialGraphError {
        let status = response.status();

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("Social graph rate limit exceeded");
                SocialGraphError::RateLimit
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!("Social graph authentication failed");
                SocialGraphError::Unauthorized
            }
            _ => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".into());
                SocialGraphError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }
}

#[async_trait]
impl SocialGraph for SocialGraphClient {
    #[instrument(skip(self))]
    async fn user_by_fid(
        &self,
        fid: u64,
        viewer_fid: Option<u64>,
    ) -> Result<Option<User>, SocialGraphError> {
        let users = self.users_bulk(&[fid], viewer_fid).await?;
        Ok(users.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn following_page(
        &self,
        fid: u64,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<FollowingPage, SocialGraphError> {
        let mut query = vec![("fid", fid.to_string()), ("limit", limit.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/following", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("accept", "application/json")
            .query(&query)
            .send()
            .await?;

        let page = self.handle_response::<FollowingPage>(response).await?;
        debug!(entries = page.users.len(), "Fetched following page");
        Ok(page)
    }

    #[instrument(skip(self))]
    async fn fid_by_username(&self, username: &str) -> Result<Option<u64>, SocialGraphError> {
        let response = self
            .client
            .get(format!("{}/user/by_username", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("accept", "application/json")
            .query(&[("username", username)])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(username, "Username not found");
            return Ok(None);
        }

        self.handle_response::<UserByUsernameResponse>(response)
            .await
            .map(|r| r.user.map(|u| u.fid).filter(|fid| *fid != 0))
    }
}
