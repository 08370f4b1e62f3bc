//! # Access SDK
//!
//! Normalized data model and capability traits for read-only access-governance
//! connectors.
//!
//! A connector publishes what it finds in an upstream system as three kinds of
//! records:
//!
//! - [`Resource`] - an object in the upstream system (user, role, project, ...)
//! - [`Entitlement`] - a named permission an object can hand out
//! - [`Grant`] - a concrete "principal holds entitlement on object" fact
//!
//! An external sync engine drives every [`ResourceSyncer`] page by page with an
//! opaque [`PageToken`] and persists whatever comes back. Connectors never loop
//! across pages themselves.
//!
//! ## Crate Organization
//!
//! - [`resource`] - Resource types, identifiers and traits
//! - [`entitlement`] - Entitlements and grants
//! - [`paging`] - Page tokens, per-call attributes and results
//! - [`traits`] - `ResourceSyncer` and `Connector` capability traits
//! - [`error`] - Error type shared by every syncer

pub mod entitlement;
pub mod error;
pub mod paging;
pub mod resource;
pub mod traits;

/// Prelude module for convenient imports.
///
/// ```
/// use access_sdk::prelude::*;
/// ```
pub mod prelude {
    pub use crate::entitlement::{Entitlement, EntitlementPurpose, Grant};
    pub use crate::error::{SyncError, SyncResult};
    pub use crate::paging::{Annotation, PageToken, SyncOpAttrs, SyncOpResults};
    pub use crate::resource::{
        ExternalTarget, Resource, ResourceId, ResourceTrait, ResourceType, SkipPolicy, TraitKind,
        UserStatus,
    };
    pub use crate::traits::{Connector, ConnectorMetadata, ResourceSyncer};
}

// Re-export async_trait for connector implementors
pub use async_trait::async_trait;
