//! Test helpers and fixtures for stockyard-authz tests
//!
//! Common utilities and fixture builders to reduce boilerplate and keep test
//! setup consistent across the codebase.

use std::sync::Arc;

use crate::models::{OrgId, OrganisationType, Principal, Role, UserId};
use crate::repository::{
    MemoryFeatureStore, MemoryOrgFeatureStore, MemoryOverrideStore, MemoryRoleAssignmentStore,
    MemoryRoleStore,
};
use crate::service::PermissionEngine;

/// Create a test user ID
pub fn test_user_id(id: &str) -> UserId {
    UserId::from_string(id.to_string())
}

/// Create a test organisation ID
pub fn test_org_id(id: &str) -> OrgId {
    OrgId::from_string(id.to_string())
}

/// Generate a random user ID for testing
pub fn random_user_id() -> UserId {
    UserId::new()
}

/// Generate a random organisation ID for testing
pub fn random_org_id() -> OrgId {
    OrgId::new()
}

/// Test fixture builder for Role
pub struct RoleFixture {
    name: String,
    description: Option<String>,
    is_system: bool,
    patterns: Vec<String>,
}

impl RoleFixture {
    pub fn new() -> Self {
        Self {
            name: "Test Role".to_string(),
            description: None,
            is_system: false,
            patterns: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_patterns(mut self, patterns: &[&str]) -> Self {
        self.patterns = patterns.iter().map(|p| (*p).to_string()).collect();
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }

    pub fn build(self) -> Role {
        let raw: Vec<&str> = self.patterns.iter().map(String::as_str).collect();
        let mut role = Role::new(&self.name, &raw);
        role.description = self.description;
        role.is_system = self.is_system;
        role
    }
}

impl Default for RoleFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Test fixture builder for `OrganisationType`
pub struct OrgTypeFixture {
    name: String,
    patterns: Vec<String>,
}

impl OrgTypeFixture {
    pub fn new() -> Self {
        Self {
            name: "Test Type".to_string(),
            patterns: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_patterns(mut self, patterns: &[&str]) -> Self {
        self.patterns = patterns.iter().map(|p| (*p).to_string()).collect();
        self
    }

    pub fn build(self) -> OrganisationType {
        let raw: Vec<&str> = self.patterns.iter().map(String::as_str).collect();
        OrganisationType::new(&self.name, &raw)
    }
}

impl Default for OrgTypeFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// An engine wired to fresh in-memory stores seeded with the default feature
/// catalog.
pub fn engine_with_memory_stores() -> PermissionEngine {
    PermissionEngine::new(
        Arc::new(MemoryFeatureStore::with_default_catalog()),
        Arc::new(MemoryOrgFeatureStore::new()),
        Arc::new(MemoryRoleStore::new()),
        Arc::new(MemoryRoleAssignmentStore::new()),
        Arc::new(MemoryOverrideStore::new()),
        crate::cache::PermissionCache::DEFAULT_MAX_ENTRIES,
        crate::cache::PermissionCache::DEFAULT_TTL_SECS,
    )
}

/// A member principal for quick test setups.
pub fn member_principal(user: &str, org: &str) -> Principal {
    Principal::member(test_user_id(user), test_org_id(org))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_fixture() {
        let role = RoleFixture::new()
            .with_name("Dispatcher")
            .with_description("Ships things")
            .with_patterns(&["shipment.*"])
            .build();

        assert_eq!(role.name, "Dispatcher");
        assert_eq!(role.description.as_deref(), Some("Ships things"));
        assert!(!role.is_system);
        assert!(role.grants("shipment.dispatch"));
    }

    #[test]
    fn test_org_type_fixture() {
        let org_type = OrgTypeFixture::new()
            .with_name("Warehouse")
            .with_patterns(&["inventory.*", "reports.view"])
            .build();

        assert_eq!(org_type.name, "Warehouse");
        assert!(org_type.enables("inventory.transfer"));
        assert!(!org_type.enables("reports.export"));
    }

    #[tokio::test]
    async fn test_engine_helper_wires_catalog() {
        let engine = engine_with_memory_stores();
        let admin = Principal::platform_admin(random_user_id());
        let set = engine.effective_set(&admin).await.expect("effective set");
        assert!(set.contains("production.create"));
    }
}
