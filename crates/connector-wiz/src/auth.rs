//! `OAuth2` client credentials authentication for the Wiz API.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use url::Url;

use crate::{WizCredentials, WizError, WizResult};

/// Token lifetime assumed when the endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// `OAuth2` token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[allow(dead_code)]
    #[serde(default)]
    token_type: Option<String>,
}

/// Cached `OAuth2` access token.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
    /// Refresh this long before `expires_at`.
    refresh_margin: Duration,
}

impl CachedToken {
    /// Returns true if the token is expired or inside its refresh margin.
    fn is_expired(&self) -> bool {
        Utc::now() + self.refresh_margin >= self.expires_at
    }
}

/// Token cache for managing `OAuth2` access tokens.
///
/// Shared by every syncer; concurrent readers only take the read lock while
/// the cached token is fresh.
#[derive(Debug)]
pub struct TokenCache {
    credentials: WizCredentials,
    token_url: Url,
    audience: String,
    http_client: reqwest::Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// Grace period before expiry to trigger refresh (default: 5 minutes).
    grace_period: Duration,
}

impl TokenCache {
    /// Creates a new token cache.
    pub fn new(
        credentials: WizCredentials,
        token_url: Url,
        audience: String,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            credentials,
            token_url,
            audience,
            http_client,
            cached_token: Arc::new(RwLock::new(None)),
            grace_period: Duration::minutes(5),
        }
    }

    /// Gets a valid access token, refreshing if necessary.
    #[instrument(skip(self), fields(client_id = %self.credentials.client_id))]
    pub async fn get_token(&self) -> WizResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cache = self.cached_token.write().await;
        // Another caller may have refreshed while we waited for the write lock.
        if let Some(ref token) = *cache {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Refreshing access token");
        let new_token = self.acquire_token().await?;
        let access_token = new_token.access_token.clone();
        *cache = Some(new_token);

        Ok(access_token)
    }

    /// Acquires a new access token using the client credentials flow.
    ///
    /// Client id and secret travel in the form body alongside `audience`.
    async fn acquire_token(&self) -> WizResult<CachedToken> {
        use secrecy::ExposeSecret;

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            (
                "client_secret",
                self.credentials.client_secret.expose_secret().as_str(),
            ),
            ("audience", self.audience.as_str()),
        ];

        let response = self
            .http_client
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| WizError::Auth(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WizError::Auth(format!(
                "Token request failed with status {status}: {body}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| WizError::Auth(format!("Failed to parse token response: {e}")))?;

        if token_response.access_token.is_empty() {
            return Err(WizError::Auth("Token endpoint returned an empty token".into()));
        }

        let lifetime = Duration::seconds(
            token_response
                .expires_in
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
        );
        let expires_at = Utc::now() + lifetime;

        debug!(
            "Acquired new token, expires at {}",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
            refresh_margin: self.grace_period.min(lifetime / 2),
        })
    }

    /// Invalidates the cached token, forcing a refresh on next use.
    pub async fn invalidate(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }
}
