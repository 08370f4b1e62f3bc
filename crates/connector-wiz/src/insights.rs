//! Security finding synchronization.
//!
//! Only open issues affecting user or service accounts are published. Each
//! becomes a leaf `security-insight` resource pointing at the cloud resource
//! it was raised on.

use access_sdk::prelude::*;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::client::WizClient;
use crate::error::sync_error;
use crate::models::Issue;
use crate::resource_types::SECURITY_INSIGHT;

/// Cloud provider an external resource id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudProvider {
    Aws,
    Azure,
    Gcp,
    Unknown,
}

impl CloudProvider {
    /// Infers the provider from the shape of an external id.
    #[must_use]
    pub fn infer(external_id: &str) -> Self {
        if external_id.starts_with("arn:aws:") {
            Self::Aws
        } else if external_id.starts_with("/subscriptions/") {
            Self::Azure
        } else if external_id.starts_with("//") || external_id.contains("projects/") {
            Self::Gcp
        } else {
            Self::Unknown
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishes Wiz issues as `security-insight` resources.
#[derive(Debug)]
pub struct InsightSyncer {
    client: Arc<WizClient>,
}

impl InsightSyncer {
    pub fn new(client: Arc<WizClient>) -> Self {
        Self { client }
    }
}

/// Maps an issue to an insight resource.
///
/// Returns `None` for issues without an id or affected external id.
pub(crate) fn insight_resource(issue: &Issue) -> SyncResult<Option<Resource>> {
    let snapshot = &issue.entity_snapshot;
    if issue.id.is_empty() || snapshot.external_id.is_empty() {
        return Ok(None);
    }

    let rule = issue.source_rule.name.as_str();
    let platform = snapshot
        .cloud_platform
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or("Unknown");

    let resource = Resource::new(
        &SECURITY_INSIGHT,
        format!("{}:{}", issue.id, snapshot.external_id),
        format!("{rule} - {}", snapshot.name),
    )?
    .with_description(format!(
        "Wiz Security Issue: {rule} (Status: {}, Severity: {}) affecting {platform} resource {}",
        issue.status, issue.severity, snapshot.name
    ))
    .with_trait(ResourceTrait::SecurityInsight {
        issue: format!("[{}] {}: {rule}", issue.severity, issue.issue_type),
        severity: issue.severity.clone(),
        status: issue.status.clone(),
        target: ExternalTarget {
            external_id: snapshot.external_id.clone(),
            app_hint: CloudProvider::infer(&snapshot.external_id).to_string(),
        },
        observed_at: issue.created_at,
    });

    Ok(Some(resource))
}

#[async_trait]
impl ResourceSyncer for InsightSyncer {
    fn resource_type(&self) -> &ResourceType {
        &SECURITY_INSIGHT
    }

    #[instrument(skip(self, _parent, attrs), fields(resource_type = "security-insight"))]
    async fn list(
        &self,
        _parent: Option<&ResourceId>,
        attrs: &SyncOpAttrs,
    ) -> SyncResult<(Vec<Resource>, SyncOpResults)> {
        let page = self
            .client
            .list_issues(attrs.page_token.cursor(), &attrs.cancel)
            .await
            .map_err(|e| sync_error(&SECURITY_INSIGHT.id, "list", e))?;

        let mut resources = Vec::with_capacity(page.items.len());
        let mut skipped = 0usize;
        for issue in &page.items {
            match insight_resource(issue)? {
                Some(resource) => resources.push(resource),
                None => skipped += 1,
            }
        }

        let mut results = SyncOpResults::next(page.page_info.next_page_token());
        if skipped > 0 {
            debug!(skipped, "Skipped issues without an affected resource");
            results = results.with_annotation(Annotation::SkippedRecords {
                count: skipped,
                reason: "issue has no id or external resource id".to_string(),
            });
        }

        Ok((resources, results))
    }

    async fn entitlements(
        &self,
        _resource: &Resource,
        _attrs: &SyncOpAttrs,
    ) -> SyncResult<(Vec<Entitlement>, SyncOpResults)> {
        Ok((Vec::new(), SyncOpResults::done()))
    }

    async fn grants(
        &self,
        _resource: &Resource,
        _attrs: &SyncOpAttrs,
    ) -> SyncResult<(Vec<Grant>, SyncOpResults)> {
        Ok((Vec::new(), SyncOpResults::done()))
    }
}
