//! Identity provider seam.
//!
//! Sign-in, context retrieval and URL actions are performed by the frame SDK
//! on the client; this trait is the boundary the verification flow talks to.

use crate::error::AllowlistError;
use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use urlencoding::encode;

/// A signed-in social platform user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub fid: u64,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub pfp_url: Option<String>,
    #[serde(default)]
    pub custody_address: Option<String>,
    #[serde(default)]
    pub verified_addresses: Vec<String>,
}

impl Identity {
    /// Wallet to register: first verified address, else the custody address.
    pub fn wallet(&self) -> Option<&str> {
        self.verified_addresses
            .first()
            .map(String::as_str)
            .or(self.custody_address.as_deref())
            .filter(|w| !w.is_empty())
    }

    /// Handle to show, falling back to `fid:<n>` when the user has none.
    pub fn handle(&self) -> String {
        if self.username.is_empty() {
            format!("fid:{}", self.fid)
        } else {
            self.username.clone()
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// User already present in the frame context.
    async fn context_user(&self) -> Option<Identity>;

    /// Explicit sign-in; `Ok(None)` if the user declined.
    async fn sign_in(&self, nonce: &str) -> Result<Option<Identity>, AllowlistError>;

    /// Open an external URL in the host client.
    async fn open_url(&self, url: &str) -> Result<(), AllowlistError>;
}

/// Resolve the current user, falling back to explicit sign-in.
pub async fn connect(provider: &dyn IdentityProvider) -> Result<Option<Identity>, AllowlistError> {
    if let Some(user) = provider.context_user().await {
        debug!(fid = user.fid, "User found in frame context");
        return Ok(Some(user));
    }

    info!("No user in context, attempting sign-in");
    let nonce = sign_in_nonce();
    provider.sign_in(&nonce).await
}

fn sign_in_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Share composer URL with pre-filled text and an optional embed.
pub fn compose_url(base: &str, text: &str, embed_url: Option<&str>) -> String {
    let mut url = format!("{}?text={}", base, encode(text));
    if let Some(embed) = embed_url {
        url.push_str("&embeds[]=");
        url.push_str(&encode(embed));
    }
    url
}

/// Profile page of `username` on the host client.
pub fn profile_url(base: &str, username: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), encode(username))
}
