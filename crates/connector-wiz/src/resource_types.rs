//! Resource types published by the Wiz connector.

use access_sdk::prelude::{ResourceType, SkipPolicy, TraitKind};
use std::sync::LazyLock;

pub static USER: LazyLock<ResourceType> = LazyLock::new(|| {
    ResourceType::new("user", "User", TraitKind::User).with_permission("read:users")
});

/// Role grants are derived from the principal collection, hence `read:users`.
pub static ROLE: LazyLock<ResourceType> = LazyLock::new(|| {
    ResourceType::new("role", "Role", TraitKind::Role).with_permission("read:users")
});

pub static PROJECT: LazyLock<ResourceType> = LazyLock::new(|| {
    ResourceType::new("project", "Project", TraitKind::Group).with_permission("read:projects")
});

pub static SECURITY_INSIGHT: LazyLock<ResourceType> = LazyLock::new(|| {
    ResourceType::new("security-insight", "Security Insight", TraitKind::SecurityInsight)
        .with_permission("read:issues")
        .with_skip(SkipPolicy::EntitlementsAndGrants)
});

/// Every resource type, in sync order.
#[must_use]
pub fn all() -> Vec<ResourceType> {
    vec![
        USER.clone(),
        ROLE.clone(),
        PROJECT.clone(),
        SECURITY_INSIGHT.clone(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_ids_are_unique() {
        let types = all();
        let mut ids: Vec<_> = types.iter().map(|t| t.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_security_insight_skips_entitlements_and_grants() {
        assert_eq!(SECURITY_INSIGHT.skip, SkipPolicy::EntitlementsAndGrants);
        assert_eq!(USER.skip, SkipPolicy::None);
        assert_eq!(PROJECT.traits, vec![TraitKind::Group]);
    }

    #[test]
    fn test_required_permissions() {
        assert_eq!(USER.permissions, vec!["read:users"]);
        assert_eq!(ROLE.permissions, vec!["read:users"]);
        assert_eq!(PROJECT.permissions, vec!["read:projects"]);
        assert_eq!(SECURITY_INSIGHT.permissions, vec!["read:issues"]);
    }
}
