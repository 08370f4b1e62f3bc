//! Entitlements and grants.

use serde::{Deserialize, Serialize};

use crate::resource::{Resource, ResourceId, ResourceType};

/// What holding an entitlement means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementPurpose {
    /// Membership-style assignment (member of a role, project, ...).
    #[default]
    Assignment,
}

/// A named permission an object can grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    /// Deterministic id: `{resource_type}:{resource}:{slug}`.
    pub id: String,
    pub resource: ResourceId,
    pub slug: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub purpose: EntitlementPurpose,
    /// Resource type ids of principals that can hold it.
    #[serde(default)]
    pub grantable_to: Vec<String>,
}

impl Entitlement {
    /// Builds the entitlement id for a resource and slug.
    #[must_use]
    pub fn id_for(resource: &ResourceId, slug: &str) -> String {
        format!("{}:{}:{}", resource.resource_type, resource.resource, slug)
    }

    /// Creates an assignment entitlement on a resource.
    pub fn assignment(resource: &Resource, slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            id: Self::id_for(&resource.id, &slug),
            resource: resource.id.clone(),
            display_name: slug.clone(),
            slug,
            description: None,
            purpose: EntitlementPurpose::Assignment,
            grantable_to: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declares a principal type that can hold this entitlement.
    #[must_use]
    pub fn grantable_to(mut self, resource_type: &ResourceType) -> Self {
        self.grantable_to.push(resource_type.id.clone());
        self
    }
}

/// A concrete access fact: `principal` holds `slug` on `resource`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    /// Deterministic id: `{entitlement_id}:{principal_type}:{principal}`.
    pub id: String,
    pub entitlement_id: String,
    /// The object the entitlement lives on.
    pub resource: ResourceId,
    pub slug: String,
    /// The subject holding the entitlement.
    pub principal: ResourceId,
}

impl Grant {
    /// Creates a grant of `slug` on `resource` to `principal`.
    pub fn new(resource: &ResourceId, slug: impl Into<String>, principal: ResourceId) -> Self {
        let slug = slug.into();
        let entitlement_id = Entitlement::id_for(resource, &slug);
        Self {
            id: format!(
                "{}:{}:{}",
                entitlement_id, principal.resource_type, principal.resource
            ),
            entitlement_id,
            resource: resource.clone(),
            slug,
            principal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::TraitKind;

    #[test]
    fn test_assignment_entitlement() {
        let project_type = ResourceType::new("project", "Project", TraitKind::Group);
        let user_type = ResourceType::new("user", "User", TraitKind::User);
        let project = Resource::new(&project_type, "p-1", "Payments").unwrap();

        let ent = Entitlement::assignment(&project, "member")
            .grantable_to(&user_type)
            .with_display_name("Payments Project Member");

        assert_eq!(ent.id, "project:p-1:member");
        assert_eq!(ent.purpose, EntitlementPurpose::Assignment);
        assert_eq!(ent.grantable_to, vec!["user".to_string()]);
        assert_eq!(ent.display_name, "Payments Project Member");
    }

    #[test]
    fn test_grant_ids_are_deterministic() {
        let role = ResourceId::new("role", "r-admin");
        let user = ResourceId::new("user", "alice@example.com");

        let a = Grant::new(&role, "member", user.clone());
        let b = Grant::new(&role, "member", user);

        assert_eq!(a, b);
        assert_eq!(a.entitlement_id, "role:r-admin:member");
        assert_eq!(a.id, "role:r-admin:member:user:alice@example.com");
    }
}
