//! In-memory implementations of the store contracts.
//!
//! Backed by `HashMap`s guarded by `parking_lot::RwLock`. Used by tests and
//! single-node development; not durable. Replace operations swap the full
//! entry under the write lock, so a concurrent reader observes either the old
//! set or the new set, never the gap between delete and insert.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

use super::{FeatureStore, OrgFeatureStore, OverrideStore, RoleAssignmentStore, RoleStore};
use crate::models::{
    Feature, OrgId, OrgTypeId, OrganisationType, OverrideEntry, PermissionPattern, Role, RoleId,
    UserId,
};
use crate::{Error, Result};

/// In-memory feature catalog.
#[derive(Default)]
pub struct MemoryFeatureStore {
    features: RwLock<HashMap<String, Feature>>,
}

impl MemoryFeatureStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog pre-populated with the platform seed features.
    #[must_use]
    pub fn with_default_catalog() -> Self {
        let store = Self::new();
        store.seed(crate::models::default_feature_catalog());
        store
    }

    pub fn seed(&self, features: Vec<Feature>) {
        let mut map = self.features.write();
        for feature in features {
            map.insert(feature.code.clone(), feature);
        }
    }
}

#[async_trait]
impl FeatureStore for MemoryFeatureStore {
    async fn list_all(&self) -> Result<Vec<Feature>> {
        let mut features: Vec<Feature> = self.features.read().values().cloned().collect();
        features.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(features)
    }

    async fn exists(&self, code: &str) -> Result<bool> {
        Ok(self.features.read().contains_key(code))
    }
}

/// In-memory organisation feature store.
#[derive(Default)]
pub struct MemoryOrgFeatureStore {
    flags: RwLock<HashMap<OrgId, HashMap<String, bool>>>,
    types: RwLock<HashMap<OrgTypeId, OrganisationType>>,
    assignments: RwLock<HashMap<OrgId, BTreeSet<OrgTypeId>>>,
}

impl MemoryOrgFeatureStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrgFeatureStore for MemoryOrgFeatureStore {
    async fn flag_for(&self, organisation_id: &OrgId, code: &str) -> Result<Option<bool>> {
        Ok(self
            .flags
            .read()
            .get(organisation_id)
            .and_then(|flags| flags.get(code))
            .copied())
    }

    async fn flags_for(&self, organisation_id: &OrgId) -> Result<HashMap<String, bool>> {
        Ok(self
            .flags
            .read()
            .get(organisation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn types_for(&self, organisation_id: &OrgId) -> Result<Vec<OrganisationType>> {
        let assignments = self.assignments.read();
        let Some(assigned) = assignments.get(organisation_id) else {
            return Ok(Vec::new());
        };

        let types = self.types.read();
        Ok(assigned
            .iter()
            .filter_map(|id| types.get(id).cloned())
            .collect())
    }

    async fn list_types(&self) -> Result<Vec<OrganisationType>> {
        let mut types: Vec<OrganisationType> = self.types.read().values().cloned().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn create_type(&self, org_type: &OrganisationType) -> Result<()> {
        let mut types = self.types.write();
        if types.contains_key(&org_type.id) {
            return Err(Error::AlreadyExists(format!(
                "Organisation type {} already exists",
                org_type.id
            )));
        }
        types.insert(org_type.id.clone(), org_type.clone());
        Ok(())
    }

    async fn assign_type(&self, organisation_id: &OrgId, org_type_id: &OrgTypeId) -> Result<()> {
        if !self.types.read().contains_key(org_type_id) {
            return Err(Error::NotFound(format!(
                "Organisation type {org_type_id} not found"
            )));
        }
        self.assignments
            .write()
            .entry(organisation_id.clone())
            .or_default()
            .insert(org_type_id.clone());
        Ok(())
    }

    async fn unassign_type(
        &self,
        organisation_id: &OrgId,
        org_type_id: &OrgTypeId,
    ) -> Result<bool> {
        Ok(self
            .assignments
            .write()
            .get_mut(organisation_id)
            .is_some_and(|assigned| assigned.remove(org_type_id)))
    }

    async fn replace_flags(
        &self,
        organisation_id: &OrgId,
        flags: &HashMap<String, bool>,
    ) -> Result<()> {
        // Single swap under the write lock: no observable gap state
        self.flags
            .write()
            .insert(organisation_id.clone(), flags.clone());
        Ok(())
    }
}

/// In-memory role registry.
#[derive(Default)]
pub struct MemoryRoleStore {
    roles: RwLock<HashMap<RoleId, Role>>,
}

impl MemoryRoleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn get(&self, role_id: &RoleId) -> Result<Option<Role>> {
        Ok(self.roles.read().get(role_id).cloned())
    }

    async fn get_many(&self, role_ids: &[RoleId]) -> Result<Vec<Role>> {
        let roles = self.roles.read();
        Ok(role_ids
            .iter()
            .filter_map(|id| roles.get(id).cloned())
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Role>> {
        let mut roles: Vec<Role> = self.roles.read().values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn create(&self, role: &Role) -> Result<()> {
        let mut roles = self.roles.write();
        if roles.contains_key(&role.id) {
            return Err(Error::AlreadyExists(format!(
                "Role {} already exists",
                role.id
            )));
        }
        roles.insert(role.id.clone(), role.clone());
        Ok(())
    }

    async fn replace_patterns(
        &self,
        role_id: &RoleId,
        patterns: &[PermissionPattern],
    ) -> Result<()> {
        let mut roles = self.roles.write();
        let role = roles
            .get_mut(role_id)
            .ok_or_else(|| Error::NotFound(format!("Role {role_id} not found")))?;
        role.permission_patterns = patterns.to_vec();
        Ok(())
    }

    async fn delete(&self, role_id: &RoleId) -> Result<bool> {
        let mut roles = self.roles.write();
        match roles.get(role_id) {
            Some(role) if role.is_system => Ok(false),
            Some(_) => {
                roles.remove(role_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// In-memory role assignments.
#[derive(Default)]
pub struct MemoryRoleAssignmentStore {
    assignments: RwLock<HashMap<(UserId, OrgId), Vec<RoleId>>>,
}

impl MemoryRoleAssignmentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleAssignmentStore for MemoryRoleAssignmentStore {
    async fn roles_for(&self, user_id: &UserId, organisation_id: &OrgId) -> Result<Vec<RoleId>> {
        Ok(self
            .assignments
            .read()
            .get(&(user_id.clone(), organisation_id.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_roles(
        &self,
        user_id: &UserId,
        organisation_id: &OrgId,
        role_ids: &[RoleId],
    ) -> Result<()> {
        let mut deduped = Vec::with_capacity(role_ids.len());
        for role_id in role_ids {
            if !deduped.contains(role_id) {
                deduped.push(role_id.clone());
            }
        }
        // Single swap under the write lock: the pair's old set is replaced
        // whole, and other (user, organisation) keys are untouched
        self.assignments
            .write()
            .insert((user_id.clone(), organisation_id.clone()), deduped);
        Ok(())
    }
}

/// In-memory override store.
#[derive(Default)]
pub struct MemoryOverrideStore {
    overrides: RwLock<HashMap<(UserId, OrgId), HashMap<String, bool>>>,
}

impl MemoryOverrideStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OverrideStore for MemoryOverrideStore {
    async fn overrides_for(
        &self,
        user_id: &UserId,
        organisation_id: &OrgId,
    ) -> Result<HashMap<String, bool>> {
        Ok(self
            .overrides
            .read()
            .get(&(user_id.clone(), organisation_id.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_overrides(
        &self,
        user_id: &UserId,
        organisation_id: &OrgId,
        entries: &[OverrideEntry],
    ) -> Result<()> {
        let mut persisted: HashMap<String, bool> = HashMap::new();
        for entry in entries {
            match entry.state.as_flag() {
                Some(granted) => {
                    persisted.insert(entry.feature_code.clone(), granted);
                }
                None => {
                    persisted.remove(&entry.feature_code);
                }
            }
        }
        self.overrides
            .write()
            .insert((user_id.clone(), organisation_id.clone()), persisted);
        Ok(())
    }
}
