//! Hosted relational store reached through a PostgREST-style gateway.
//!
//! Reads are plain filtered selects. Admission goes through the
//! `admit_registration` database function, which serializes admissions and
//! applies the capacity, identity and wallet checks in one transaction.

use super::{normalize_wallet, Admission, NewRegistration, Registration};
use crate::error::AllowlistError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Name of the admission function exposed under `/rpc`.
const ADMIT_FUNCTION: &str = "admit_registration";

/// REST-backed registration store.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    table: String,
    service_key: SecretString,
}

#[derive(Debug, Serialize)]
struct AdmitParams<'a> {
    p_fid: u64,
    p_username: &'a str,
    p_wallet_address: &'a str,
    p_neynar_score: f64,
    p_tier: &'a str,
    p_cap: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum AdmitOutcome {
    Admitted,
    Full,
    AlreadyRegistered,
    DuplicateWallet,
}

#[derive(Debug, Deserialize)]
struct AdmitResponse {
    outcome: AdmitOutcome,
    #[serde(default)]
    registration: Option<Registration>,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    cap: Option<u64>,
}

impl RestStore {
    /// Create a new REST store client.
    pub fn new(
        base_url: impl Into<String>,
        table: impl Into<String>,
        service_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, AllowlistError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AllowlistError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            table: table.into(),
            service_key,
        })
    }

    fn auth_headers(&self) -> Result<HeaderMap, AllowlistError> {
        let key = self.service_key.expose_secret();
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(key)
                .map_err(|_| AllowlistError::Internal("Invalid service key".into()))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|_| AllowlistError::Internal("Invalid service key".into()))?,
        );
        Ok(headers)
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.base_url, self.table)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, AllowlistError> {
        let response = request.headers(self.auth_headers()?).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Store request failed");
            return Err(AllowlistError::Store(format!("{} - {}", status, body)));
        }

        Ok(response)
    }

    async fn select_one(
        &self,
        column: &str,
        value: String,
    ) -> Result<Option<Registration>, AllowlistError> {
        let request = self.client.get(self.table_url()).query(&[
            ("select", "*".to_string()),
            (column, format!("eq.{}", value)),
            ("limit", "1".to_string()),
        ]);

        let rows: Vec<Registration> = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| AllowlistError::Store(format!("Failed to parse rows: {}", e)))?;

        Ok(rows.into_iter().next())
    }

    async fn exact_count(&self, filter: Option<(&str, String)>) -> Result<u64, AllowlistError> {
        let mut query = vec![("select", "fid".to_string())];
        if let Some((column, value)) = filter {
            query.push((column, format!("eq.{}", value)));
        }

        let request = self
            .client
            .head(self.table_url())
            .header("Prefer", "count=exact")
            .query(&query);

        let response = self.send(request).await?;
        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AllowlistError::Store("Missing Content-Range header".into()))?;

        parse_content_range_total(range)
            .ok_or_else(|| AllowlistError::Store(format!("Malformed Content-Range: {}", range)))
    }

    #[instrument(skip(self))]
    pub async fn find_by_fid(&self, fid: u64) -> Result<Option<Registration>, AllowlistError> {
        self.select_one("fid", fid.to_string()).await
    }

    #[instrument(skip(self))]
    pub async fn find_by_wallet(
        &self,
        wallet: &str,
    ) -> Result<Option<Registration>, AllowlistError> {
        self.select_one("wallet_address", normalize_wallet(wallet)).await
    }

    #[instrument(skip(self))]
    pub async fn count_tier(&self, tier: &str) -> Result<u64, AllowlistError> {
        self.exact_count(Some(("tier", tier.to_string()))).await
    }

    pub async fn count(&self) -> Result<u64, AllowlistError> {
        self.exact_count(None).await
    }

    /// Run the admission function; the database enforces cap and uniqueness.
    #[instrument(skip(self, entry), fields(fid = entry.fid, tier = %entry.tier))]
    pub async fn admit(
        &self,
        entry: NewRegistration,
        cap: u64,
    ) -> Result<Admission, AllowlistError> {
        let params = AdmitParams {
            p_fid: entry.fid,
            p_username: &entry.username,
            p_wallet_address: &entry.wallet_address,
            p_neynar_score: entry.neynar_score,
            p_tier: &entry.tier,
            p_cap: cap,
        };

        let request = self
            .client
            .post(format!("{}/rpc/{}", self.base_url, ADMIT_FUNCTION))
            .json(&params);

        let response: AdmitResponse = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| AllowlistError::Store(format!("Failed to parse admission: {}", e)))?;

        debug!(outcome = ?response.outcome, "Admission function returned");

        let missing_row = || AllowlistError::Store("Admission result missing registration".into());

        Ok(match response.outcome {
            AdmitOutcome::Admitted => {
                Admission::Admitted(response.registration.ok_or_else(missing_row)?)
            }
            AdmitOutcome::AlreadyRegistered => {
                Admission::AlreadyRegistered(response.registration.ok_or_else(missing_row)?)
            }
            AdmitOutcome::Full => Admission::Full {
                count: response.count.unwrap_or(cap),
                cap: response.cap.unwrap_or(cap),
            },
            AdmitOutcome::DuplicateWallet => Admission::DuplicateWallet,
        })
    }
}

/// Total from a `Content-Range` value such as `0-24/3573` or `*/0`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}
