//! Error types for the Wiz connector.

use access_sdk::error::SyncError;
use thiserror::Error;

/// Result type alias using `WizError`.
pub type WizResult<T> = Result<T, WizError>;

/// Errors that can occur when talking to the Wiz API.
#[derive(Debug, Error)]
pub enum WizError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// `OAuth2` token exchange failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Transport-level HTTP failure (connect, send, read).
    #[error("{operation}: HTTP error: {source}")]
    Http {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status.
    #[error("{operation}: unexpected status code {status}: {body}")]
    UnexpectedStatus {
        operation: String,
        status: u16,
        body: String,
    },

    /// HTTP 200 carrying a GraphQL `errors` array.
    #[error("{operation}: graphql errors: {}", messages.join("; "))]
    GraphQl {
        operation: String,
        messages: Vec<String>,
        codes: Vec<String>,
    },

    /// Response envelope could not be decoded.
    #[error("{operation}: failed to decode response: {message}")]
    Decode { operation: String, message: String },

    /// Retry budget spent on transient failures.
    #[error("{operation}: giving up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    /// The caller cancelled the operation.
    #[error("{operation}: cancelled")]
    Cancelled { operation: String },
}

impl WizError {
    /// Check if the error is transient and the request should be retried.
    ///
    /// Only transport failures and rate limiting (HTTP 429) qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WizError::Http { .. } | WizError::UnexpectedStatus { status: 429, .. }
        )
    }

    /// Check if this is a GraphQL error denying access to the queried data.
    ///
    /// Wiz reports missing permissions as GraphQL errors on an HTTP 200
    /// response, flagged through `extensions.code` or the message text.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            WizError::GraphQl {
                messages, codes, ..
            } => {
                codes.iter().any(|c| {
                    let c = c.to_ascii_uppercase();
                    c == "UNAUTHORIZED" || c == "FORBIDDEN" || c == "UNAUTHENTICATED"
                }) || messages.iter().any(|m| {
                    let m = m.to_ascii_lowercase();
                    m.contains("permission") || m.contains("not authorized") || m.contains("forbidden")
                })
            }
            WizError::UnexpectedStatus { status, .. } => *status == 403,
            _ => false,
        }
    }

    /// Check if the operation was cancelled by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WizError::Cancelled { .. })
    }
}

/// Wraps a Wiz error into the error the sync engine sees.
pub(crate) fn sync_error(resource_type: &str, operation: &'static str, err: WizError) -> SyncError {
    if err.is_cancelled() {
        return SyncError::Cancelled;
    }
    SyncError::upstream(resource_type, operation, err)
}
