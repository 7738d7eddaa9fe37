//! Typed store contracts for the authorization core.
//!
//! Each backing store is a trait with a Postgres implementation and an
//! in-memory implementation. The engine only ever sees the traits; tests and
//! single-node development run against the in-memory stores.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::models::{
    Feature, OrgId, OrgTypeId, OrganisationType, OverrideEntry, PermissionPattern, Role, RoleId,
    UserId,
};
use crate::Result;

pub mod feature;
pub mod memory;
pub mod org_feature;
pub mod override_store;
pub mod role;

pub use feature::PgFeatureStore;
pub use memory::{
    MemoryFeatureStore, MemoryOrgFeatureStore, MemoryOverrideStore, MemoryRoleAssignmentStore,
    MemoryRoleStore,
};
pub use org_feature::PgOrgFeatureStore;
pub use override_store::PgOverrideStore;
pub use role::{PgRoleAssignmentStore, PgRoleStore};

/// Registry of all gateable features. Read-only at evaluation time.
#[async_trait]
pub trait FeatureStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Feature>>;
    async fn exists(&self, code: &str) -> Result<bool>;
}

/// Per-organisation feature enablement: explicit flags plus organisation-type
/// assignments whose default patterns supply the fallback.
#[async_trait]
pub trait OrgFeatureStore: Send + Sync {
    /// The explicit flag for one `(organisation, code)` pair, if present.
    async fn flag_for(&self, organisation_id: &OrgId, code: &str) -> Result<Option<bool>>;

    /// All explicit flags for the organisation.
    async fn flags_for(&self, organisation_id: &OrgId) -> Result<HashMap<String, bool>>;

    /// The organisation types assigned to the organisation.
    async fn types_for(&self, organisation_id: &OrgId) -> Result<Vec<OrganisationType>>;

    async fn list_types(&self) -> Result<Vec<OrganisationType>>;

    async fn create_type(&self, org_type: &OrganisationType) -> Result<()>;

    async fn assign_type(&self, organisation_id: &OrgId, org_type_id: &OrgTypeId) -> Result<()>;

    async fn unassign_type(
        &self,
        organisation_id: &OrgId,
        org_type_id: &OrgTypeId,
    ) -> Result<bool>;

    /// Replace the organisation's entire explicit flag set atomically. A
    /// reader must never observe the deleted-but-not-reinserted state.
    async fn replace_flags(
        &self,
        organisation_id: &OrgId,
        flags: &HashMap<String, bool>,
    ) -> Result<()>;
}

/// Role definitions.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn get(&self, role_id: &RoleId) -> Result<Option<Role>>;

    /// Fetch several roles at once; missing IDs are silently absent from the
    /// result.
    async fn get_many(&self, role_ids: &[RoleId]) -> Result<Vec<Role>>;

    async fn list_all(&self) -> Result<Vec<Role>>;

    async fn create(&self, role: &Role) -> Result<()>;

    /// Replace a role's pattern set atomically.
    async fn replace_patterns(
        &self,
        role_id: &RoleId,
        patterns: &[PermissionPattern],
    ) -> Result<()>;

    /// Delete a role. System roles are never deleted; returns false when
    /// nothing was removed.
    async fn delete(&self, role_id: &RoleId) -> Result<bool>;
}

/// Many-to-many `(user, organisation) -> role` assignments.
#[async_trait]
pub trait RoleAssignmentStore: Send + Sync {
    async fn roles_for(&self, user_id: &UserId, organisation_id: &OrgId) -> Result<Vec<RoleId>>;

    /// Replace the user's role set within one organisation atomically,
    /// leaving the same user's assignments in every other organisation
    /// untouched.
    async fn replace_roles(
        &self,
        user_id: &UserId,
        organisation_id: &OrgId,
        role_ids: &[RoleId],
    ) -> Result<()>;
}

/// Per-principal grant/deny overrides, keyed by feature code.
#[async_trait]
pub trait OverrideStore: Send + Sync {
    async fn overrides_for(
        &self,
        user_id: &UserId,
        organisation_id: &OrgId,
    ) -> Result<HashMap<String, bool>>;

    /// Replace the principal's full override set atomically. `Inherit`
    /// entries are dropped, not persisted.
    async fn replace_overrides(
        &self,
        user_id: &UserId,
        organisation_id: &OrgId,
        entries: &[OverrideEntry],
    ) -> Result<()>;
}
