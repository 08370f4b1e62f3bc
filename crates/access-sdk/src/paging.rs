//! Paging contract between the sync engine and resource syncers.
//!
//! Every syncer call receives a [`PageToken`] and returns the token of the
//! next page in [`SyncOpResults`]. An empty token means "first page" on the
//! way in and "no more pages" on the way out.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Opaque position in a paginated collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(String);

impl PageToken {
    /// Token addressing the first page.
    #[must_use]
    pub fn first() -> Self {
        Self(String::new())
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns true if this addresses the first page.
    #[must_use]
    pub fn is_first(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the cursor to resume from, `None` for the first page.
    #[must_use]
    pub fn cursor(&self) -> Option<&str> {
        if self.0.is_empty() {
            None
        } else {
            Some(&self.0)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PageToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for PageToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Per-call attributes handed to every syncer operation.
#[derive(Debug, Clone, Default)]
pub struct SyncOpAttrs {
    pub page_token: PageToken,
    /// Cancelling aborts the in-flight upstream call.
    pub cancel: CancellationToken,
}

impl SyncOpAttrs {
    /// Attributes for the first page with a fresh cancellation token.
    #[must_use]
    pub fn first_page() -> Self {
        Self::default()
    }

    /// Attributes for the page addressed by `token`, sharing `cancel`.
    #[must_use]
    pub fn page(token: PageToken, cancel: CancellationToken) -> Self {
        Self {
            page_token: token,
            cancel,
        }
    }
}

/// Diagnostic attached to a syncer result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Annotation {
    /// The upstream relation backing this result is not readable with the
    /// current credentials. An empty result does not mean "no data".
    CapabilityGap { relation: String, detail: String },
    /// Records dropped for lacking a required identity field.
    SkippedRecords { count: usize, reason: String },
}

/// Outcome of one syncer call besides the records themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOpResults {
    /// Token of the next page; empty when the collection is exhausted.
    #[serde(default)]
    pub next_page_token: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl SyncOpResults {
    /// Results of a final page.
    #[must_use]
    pub fn done() -> Self {
        Self::default()
    }

    /// Results pointing at the next page (empty token = done).
    pub fn next(token: impl Into<String>) -> Self {
        Self {
            next_page_token: token.into(),
            annotations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Returns true if another page should be requested.
    #[must_use]
    pub fn has_more(&self) -> bool {
        !self.next_page_token.is_empty()
    }

    /// Token to pass into the next call.
    #[must_use]
    pub fn next_token(&self) -> PageToken {
        PageToken::new(self.next_page_token.clone())
    }
}
