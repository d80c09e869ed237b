//! Configuration for the allowlist service.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Social graph API configuration
    #[serde(default)]
    pub social_graph: SocialGraphConfig,

    /// Admission policy
    #[serde(default)]
    pub allowlist: AllowlistConfig,

    /// Verification flow timings and links
    #[serde(default)]
    pub flow: FlowConfig,

    /// Registration storage configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SocialGraphConfig {
    /// Social graph API base URL
    #[serde(default = "default_social_graph_url")]
    pub api_url: String,

    /// API key; score and follow checks are unavailable without it
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Per-request timeout
    #[serde(default = "default_http_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllowlistConfig {
    /// Minimum reputation score (inclusive)
    #[serde(default = "default_min_score")]
    pub min_score: f64,

    /// Registrations allowed per phase; 0 means unlimited
    #[serde(default)]
    pub cap: u64,

    /// Current phase label
    #[serde(default = "default_phase")]
    pub phase: String,

    /// Fid of the account users must follow
    #[serde(default)]
    pub target_fid: Option<u64>,

    /// Username resolved when no target fid is configured
    #[serde(default = "default_target_username")]
    pub target_username: String,

    /// How long a looked-up target fid stays valid
    #[serde(default = "default_target_cache_ttl", with = "humantime_serde")]
    pub target_cache_ttl: Duration,

    /// Canonical app URL embedded in share posts
    #[serde(default)]
    pub app_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    /// Pause after opening the share composer before share counts as done
    #[serde(default = "default_share_delay", with = "humantime_serde")]
    pub share_delay: Duration,

    /// Pause after the follow redirect before re-checking
    #[serde(default = "default_follow_recheck_delay", with = "humantime_serde")]
    pub follow_recheck_delay: Duration,

    /// Share composer base URL
    #[serde(default = "default_compose_url")]
    pub compose_url: String,

    /// Profile base URL used for the follow redirect
    #[serde(default = "default_profile_url")]
    pub profile_url: String,

    /// Text pre-filled in the share composer
    #[serde(default = "default_share_text")]
    pub share_text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process registry, optionally snapshotted to disk
    #[default]
    Memory,
    /// Hosted relational store behind a REST gateway
    Rest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Snapshot file for the memory backend
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    /// REST gateway URL (e.g. `https://xyz.supabase.co/rest/v1`)
    #[serde(default)]
    pub rest_url: Option<String>,

    /// Service key for the REST gateway
    #[serde(default)]
    pub service_key: Option<SecretString>,

    /// Table holding registrations
    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_http_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for SocialGraphConfig {
    fn default() -> Self {
        Self {
            api_url: default_social_graph_url(),
            api_key: None,
            timeout: default_http_timeout(),
        }
    }
}

impl Default for AllowlistConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            cap: 0,
            phase: default_phase(),
            target_fid: None,
            target_username: default_target_username(),
            target_cache_ttl: default_target_cache_ttl(),
            app_url: None,
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            share_delay: default_share_delay(),
            follow_recheck_delay: default_follow_recheck_delay(),
            compose_url: default_compose_url(),
            profile_url: default_profile_url(),
            share_text: default_share_text(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            snapshot_path: None,
            rest_url: None,
            service_key: None,
            table: default_table(),
            timeout: default_http_timeout(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    3000
}

fn default_social_graph_url() -> String {
    social_graph_client::DEFAULT_API_URL.into()
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_min_score() -> f64 {
    0.5
}

fn default_phase() -> String {
    "phase1_tier3".into()
}

fn default_target_username() -> String {
    "protardio".into()
}

fn default_target_cache_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_share_delay() -> Duration {
    Duration::from_millis(2500)
}

fn default_follow_recheck_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_compose_url() -> String {
    "https://warpcast.com/~/compose".into()
}

fn default_profile_url() -> String {
    "https://warpcast.com".into()
}

fn default_share_text() -> String {
    "Registering for the Protardio allowlist!\n\nJoin the allowlist:".into()
}

fn default_table() -> String {
    "registrations".into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that cannot serve requests.
    pub fn validate(&self) -> Result<()> {
        if !self.allowlist.min_score.is_finite() || self.allowlist.min_score < 0.0 {
            anyhow::bail!(
                "ALLOWLIST__MIN_SCORE must be a non-negative number, got {}",
                self.allowlist.min_score
            );
        }

        if self.allowlist.phase.trim().is_empty() {
            anyhow::bail!("ALLOWLIST__PHASE must not be empty");
        }

        if self.store.backend == StoreBackend::Rest {
            self.store
                .rest_url
                .as_deref()
                .filter(|url| !url.is_empty())
                .context("STORE__REST_URL is required for the rest backend")?;
            self.store
                .service_key
                .as_ref()
                .context("STORE__SERVICE_KEY is required for the rest backend")?;
        }

        Ok(())
    }
}
