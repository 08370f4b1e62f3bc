//! Connector configuration.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::retry::RetryPolicy;
use crate::{WizError, WizResult};

/// Audience the Wiz token endpoint expects for API tokens.
pub const DEFAULT_AUDIENCE: &str = "wiz-api";

/// Records requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page the API accepts.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `OAuth2` client credentials for the Wiz API.
#[derive(Debug)]
pub struct WizCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl WizCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
        }
    }
}

/// How the principal-to-role/project relation is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationMode {
    /// Probe the API once and use whatever the credentials can read.
    #[default]
    Auto,
    /// Assume the relation is readable; a denial is a hard error.
    Enabled,
    /// Never query the relation.
    Disabled,
}

impl FromStr for RelationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "enabled" | "on" => Ok(Self::Enabled),
            "disabled" | "off" => Ok(Self::Disabled),
            other => Err(format!(
                "invalid relation mode '{other}' (expected auto, enabled or disabled)"
            )),
        }
    }
}

impl fmt::Display for RelationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        })
    }
}

/// Which syncer emits principal-to-role grants.
///
/// Exactly one syncer owns role grants in a deployment; the other returns
/// none for that relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleGrantSource {
    /// Users emit their own role grant from the role cached during listing.
    #[default]
    Users,
    /// Roles scan the principal collection for holders.
    Roles,
}

impl FromStr for RoleGrantSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "users" | "user" => Ok(Self::Users),
            "roles" | "role" => Ok(Self::Roles),
            other => Err(format!(
                "invalid role grant source '{other}' (expected users or roles)"
            )),
        }
    }
}

impl fmt::Display for RoleGrantSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Users => "users",
            Self::Roles => "roles",
        })
    }
}

/// Validated connector configuration.
#[derive(Debug, Clone)]
pub struct WizConfig {
    /// GraphQL endpoint (e.g. `https://api.us1.app.wiz.io/graphql`).
    pub api_url: Url,
    /// `OAuth2` token endpoint (e.g. `https://auth.app.wiz.io/oauth/token`).
    pub auth_endpoint: Url,
    /// `audience` parameter sent with token requests.
    pub audience: String,
    pub page_size: u32,
    pub request_timeout: Duration,
    pub relation_mode: RelationMode,
    pub role_grant_source: RoleGrantSource,
    pub retry: RetryPolicy,
}

impl WizConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> WizConfigBuilder {
        WizConfigBuilder::default()
    }
}

/// Builder for [`WizConfig`].
#[derive(Debug, Default)]
pub struct WizConfigBuilder {
    api_url: Option<String>,
    auth_endpoint: Option<String>,
    audience: Option<String>,
    page_size: Option<u32>,
    request_timeout: Option<Duration>,
    relation_mode: Option<RelationMode>,
    role_grant_source: Option<RoleGrantSource>,
    retry: Option<RetryPolicy>,
}

impl WizConfigBuilder {
    #[must_use]
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn auth_endpoint(mut self, url: impl Into<String>) -> Self {
        self.auth_endpoint = Some(url.into());
        self
    }

    #[must_use]
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn relation_mode(mut self, mode: RelationMode) -> Self {
        self.relation_mode = Some(mode);
        self
    }

    #[must_use]
    pub fn role_grant_source(mut self, source: RoleGrantSource) -> Self {
        self.role_grant_source = Some(source);
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WizError::Config`] if a required field is missing or invalid.
    pub fn build(self) -> WizResult<WizConfig> {
        let api_url = parse_http_url("api_url", self.api_url)?;
        let auth_endpoint = parse_http_url("auth_endpoint", self.auth_endpoint)?;

        let audience = self.audience.unwrap_or_else(|| DEFAULT_AUDIENCE.to_string());
        if audience.trim().is_empty() {
            return Err(WizError::Config("audience must not be empty".into()));
        }

        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(WizError::Config(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        if request_timeout.is_zero() {
            return Err(WizError::Config("request_timeout must be > 0".into()));
        }

        let retry = self.retry.unwrap_or_default();
        retry
            .validate()
            .map_err(|e| WizError::Config(format!("invalid retry policy: {e}")))?;

        Ok(WizConfig {
            api_url,
            auth_endpoint,
            audience,
            page_size,
            request_timeout,
            relation_mode: self.relation_mode.unwrap_or_default(),
            role_grant_source: self.role_grant_source.unwrap_or_default(),
            retry,
        })
    }
}

fn parse_http_url(field: &str, value: Option<String>) -> WizResult<Url> {
    let raw = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| WizError::Config(format!("{field} is required")))?;
    let url = Url::parse(raw.trim())
        .map_err(|e| WizError::Config(format!("{field} is not a valid URL: {e}")))?;
    match url.scheme() {
        "https" | "http" => Ok(url),
        other => Err(WizError::Config(format!(
            "{field} has unsupported scheme '{other}'"
        ))),
    }
}
