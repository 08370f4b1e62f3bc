//! GraphQL transport for the Wiz API with token injection and retry handling.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::models::GraphQlResponse;
use crate::retry::RetryPolicy;
use crate::{TokenCache, WizError, WizResult};

/// Longest error body kept in an [`WizError::UnexpectedStatus`].
const MAX_ERROR_BODY_LEN: usize = 512;

/// Request body of a GraphQL call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlRequest<'a> {
    operation_name: &'a str,
    query: &'a str,
    variables: &'a serde_json::Value,
}

/// Wiz GraphQL API client.
#[derive(Debug)]
pub struct GraphQlClient {
    http_client: reqwest::Client,
    api_url: Url,
    token_cache: Arc<TokenCache>,
    retry: RetryPolicy,
}

impl GraphQlClient {
    /// Creates a new client posting to `api_url`.
    pub fn new(
        http_client: reqwest::Client,
        api_url: Url,
        token_cache: Arc<TokenCache>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http_client,
            api_url,
            token_cache,
            retry,
        }
    }

    /// Executes a named query and decodes its `data` payload.
    ///
    /// Transport failures and HTTP 429 are retried with backoff up to the
    /// policy's attempt budget. Every other failure returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`WizError::Cancelled`] when `cancel` fires, otherwise the
    /// first non-retryable failure or [`WizError::RetriesExhausted`].
    #[instrument(skip(self, query, variables, cancel))]
    pub async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: serde_json::Value,
        cancel: &CancellationToken,
    ) -> WizResult<T> {
        let request = GraphQlRequest {
            operation_name: operation,
            query,
            variables: &variables,
        };

        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(operation));
            }

            let failure = match self.attempt(operation, &request, cancel).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_retryable() => e.to_string(),
                Err(e) => return Err(e),
            };

            if !self.retry.can_retry(attempt) {
                return Err(WizError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt + 1,
                    last_error: failure,
                });
            }

            let delay = self.retry.delay_for(attempt);
            attempt += 1;
            warn!(
                "{operation}: {failure}, retry {attempt}/{} after {delay:?}",
                self.retry.max_attempts - 1
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled(operation)),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Sends one request. The caller decides whether an error is retried.
    async fn attempt<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: &GraphQlRequest<'_>,
        cancel: &CancellationToken,
    ) -> WizResult<T> {
        let token = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled(operation)),
            token = self.token_cache.get_token() => token?,
        };

        let send = self
            .http_client
            .post(self.api_url.clone())
            .bearer_auth(&token)
            .json(request)
            .send();

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled(operation)),
            response = send => response,
        }
        .map_err(|source| http_error(operation, source))?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                self.token_cache.invalidate().await;
            }
            let body = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled(operation)),
                body = response.text() => body.unwrap_or_default(),
            };
            return Err(WizError::UnexpectedStatus {
                operation: operation.to_string(),
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY_LEN),
            });
        }

        let body = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled(operation)),
            body = response.bytes() => body,
        }
        .map_err(|source| http_error(operation, source))?;

        debug!("{operation}: received {} bytes", body.len());
        decode(operation, &body)
    }
}

fn http_error(operation: &str, source: reqwest::Error) -> WizError {
    WizError::Http {
        operation: operation.to_string(),
        source,
    }
}

/// Decodes a GraphQL envelope, failing on any reported error.
fn decode<T: DeserializeOwned>(operation: &str, body: &[u8]) -> WizResult<T> {
    let envelope: GraphQlResponse<serde_json::Value> =
        serde_json::from_slice(body).map_err(|e| WizError::Decode {
            operation: operation.to_string(),
            message: e.to_string(),
        })?;

    if !envelope.errors.is_empty() {
        return Err(WizError::GraphQl {
            operation: operation.to_string(),
            messages: envelope.errors.iter().map(|e| e.describe()).collect(),
            codes: envelope
                .errors
                .iter()
                .filter_map(|e| e.extensions.as_ref()?.code.clone())
                .collect(),
        });
    }

    let data = envelope
        .data
        .filter(|d| !d.is_null())
        .ok_or_else(|| WizError::Decode {
            operation: operation.to_string(),
            message: "response has no data".to_string(),
        })?;

    serde_json::from_value(data).map_err(|e| WizError::Decode {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}

fn cancelled(operation: &str) -> WizError {
    WizError::Cancelled {
        operation: operation.to_string(),
    }
}

fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
