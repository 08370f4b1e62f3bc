//! Connector capability traits
//!
//! The sync engine only ever talks to a connector through these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::entitlement::{Entitlement, Grant};
use crate::error::SyncResult;
use crate::paging::{SyncOpAttrs, SyncOpResults};
use crate::resource::{Resource, ResourceId, ResourceType};

/// Publishes one resource type page by page.
///
/// Each call fetches at most one upstream page and returns the token of the
/// next one. Implementations hold no per-sync state between calls.
#[async_trait]
pub trait ResourceSyncer: Send + Sync {
    /// The resource type this syncer publishes.
    fn resource_type(&self) -> &ResourceType;

    /// List one page of resources.
    async fn list(
        &self,
        parent: Option<&ResourceId>,
        attrs: &SyncOpAttrs,
    ) -> SyncResult<(Vec<Resource>, SyncOpResults)>;

    /// List one page of entitlements offered by `resource`.
    async fn entitlements(
        &self,
        resource: &Resource,
        attrs: &SyncOpAttrs,
    ) -> SyncResult<(Vec<Entitlement>, SyncOpResults)>;

    /// List one page of grants on `resource`.
    async fn grants(
        &self,
        resource: &Resource,
        attrs: &SyncOpAttrs,
    ) -> SyncResult<(Vec<Grant>, SyncOpResults)>;
}

/// Descriptive metadata of a connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorMetadata {
    pub display_name: String,
    pub description: String,
}

/// Composition root registered with the sync engine.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Describe this connector.
    fn metadata(&self) -> ConnectorMetadata;

    /// Exercise the configured credentials against the upstream system.
    async fn validate(&self, attrs: &SyncOpAttrs) -> SyncResult<()>;

    /// One syncer per published resource type.
    fn resource_syncers(&self) -> Vec<Arc<dyn ResourceSyncer>>;
}
