//! Resource types, identifiers and traits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{SyncError, SyncResult};

/// Trait a resource type carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    /// Human or service principal.
    User,
    /// Named permission level.
    Role,
    /// Container with members.
    Group,
    /// Informational finding about an external resource.
    SecurityInsight,
}

impl TraitKind {
    /// Returns the canonical trait name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TraitKind::User => "user",
            TraitKind::Role => "role",
            TraitKind::Group => "group",
            TraitKind::SecurityInsight => "security_insight",
        }
    }
}

/// Which sync phases the engine can skip for a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipPolicy {
    /// Entitlements and grants are both synced.
    #[default]
    None,
    /// Entitlements are static and need not be listed per resource.
    Entitlements,
    /// The type never has entitlements nor grants.
    EntitlementsAndGrants,
}

/// Declaration of a resource type published by a connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    /// Stable identifier (e.g. "user").
    pub id: String,
    /// Human readable name.
    pub display_name: String,
    /// Traits resources of this type carry.
    pub traits: Vec<TraitKind>,
    /// Upstream permission scopes required to read this type.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Sync phases the engine can skip.
    #[serde(default)]
    pub skip: SkipPolicy,
}

impl ResourceType {
    /// Creates a resource type with a single trait.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, kind: TraitKind) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            traits: vec![kind],
            permissions: Vec::new(),
            skip: SkipPolicy::None,
        }
    }

    /// Adds a required permission scope.
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    /// Sets the skip policy.
    #[must_use]
    pub fn with_skip(mut self, skip: SkipPolicy) -> Self {
        self.skip = skip;
        self
    }
}

/// Identifier of a resource: its type plus its id within that type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    pub resource_type: String,
    pub resource: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource: resource.into(),
        }
    }

    /// Builds an identifier, rejecting an empty resource id.
    pub fn checked(resource_type: &ResourceType, resource: impl Into<String>) -> SyncResult<Self> {
        let resource = resource.into();
        if resource.trim().is_empty() {
            return Err(SyncError::InvalidResource {
                message: format!("empty {} id", resource_type.id),
            });
        }
        Ok(Self::new(resource_type.id.clone(), resource))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.resource)
    }
}

/// Account status of a user resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Enabled,
    Disabled,
}

/// External resource a security insight points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTarget {
    /// Identifier of the resource in its own system (ARN, resource path, ...).
    pub external_id: String,
    /// Hint naming the system the id belongs to ("aws", "azure", ...).
    pub app_hint: String,
}

/// Trait-specific payload of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceTrait {
    User {
        /// Email addresses, primary first.
        emails: Vec<String>,
        status: UserStatus,
        #[serde(default)]
        profile: Map<String, Value>,
    },
    Role {
        #[serde(default)]
        profile: Map<String, Value>,
    },
    Group {
        #[serde(default)]
        profile: Map<String, Value>,
    },
    SecurityInsight {
        issue: String,
        severity: String,
        status: String,
        target: ExternalTarget,
        observed_at: Option<DateTime<Utc>>,
    },
}

impl ResourceTrait {
    /// Returns the kind of this trait.
    #[must_use]
    pub fn kind(&self) -> TraitKind {
        match self {
            ResourceTrait::User { .. } => TraitKind::User,
            ResourceTrait::Role { .. } => TraitKind::Role,
            ResourceTrait::Group { .. } => TraitKind::Group,
            ResourceTrait::SecurityInsight { .. } => TraitKind::SecurityInsight,
        }
    }

    /// Returns the profile map, if this trait carries one.
    #[must_use]
    pub fn profile(&self) -> Option<&Map<String, Value>> {
        match self {
            ResourceTrait::User { profile, .. }
            | ResourceTrait::Role { profile }
            | ResourceTrait::Group { profile } => Some(profile),
            ResourceTrait::SecurityInsight { .. } => None,
        }
    }
}

/// A normalized upstream object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<ResourceTrait>,
}

impl Resource {
    /// Creates a resource of the given type.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidResource`] if `id` is empty.
    pub fn new(
        resource_type: &ResourceType,
        id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> SyncResult<Self> {
        Ok(Self {
            id: ResourceId::checked(resource_type, id)?,
            display_name: display_name.into(),
            description: None,
            parent: None,
            traits: None,
        })
    }

    /// Sets the description, ignoring blank text.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        if !description.trim().is_empty() {
            self.description = Some(description);
        }
        self
    }

    /// Attaches the trait payload.
    #[must_use]
    pub fn with_trait(mut self, resource_trait: ResourceTrait) -> Self {
        self.traits = Some(resource_trait);
        self
    }

    /// Returns the profile of the attached trait.
    #[must_use]
    pub fn profile(&self) -> Option<&Map<String, Value>> {
        self.traits.as_ref().and_then(ResourceTrait::profile)
    }

    /// Reads a non-empty string value from the profile.
    #[must_use]
    pub fn profile_str(&self, key: &str) -> Option<&str> {
        self.profile()?
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Reads a list of non-empty strings from the profile.
    #[must_use]
    pub fn profile_str_list(&self, key: &str) -> Vec<&str> {
        self.profile()
            .and_then(|p| p.get(key))
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}
