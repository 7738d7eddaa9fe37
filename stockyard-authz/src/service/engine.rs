//! Effective-permission evaluation.
//!
//! Composes the feature catalog, organisation enablement, role assignments,
//! and per-principal overrides into a single decision. Evaluation order is
//! fixed and each step short-circuits:
//!
//! 1. a platform admin is allowed
//! 2. no organisation context denies
//! 3. an organisation that does not enable the feature denies (overrides
//!    cannot defeat this gate)
//! 4. an override row, if present, is authoritative
//! 5. any assigned role pattern that matches allows
//! 6. otherwise denied
//!
//! Decisions are values: a denial is an ordinary `false`/`Authorization`
//! outcome. Infrastructure failures propagate as errors and never degrade
//! into an implicit allow.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::cache::{CacheInvalidationService, PermissionCache};
use crate::metrics;
use crate::models::{
    OrgId, OrganisationType, OrgTypeId, OverrideEntry, PermissionPattern, Principal, Role, RoleId,
    UserId,
};
use crate::repository::{
    FeatureStore, OrgFeatureStore, OverrideStore, RoleAssignmentStore, RoleStore,
};
use crate::service::OrganizationFeatureResolver;
use crate::validation::{validate_name, FeatureCodeValidator, PatternValidator};
use crate::{Error, Result};

#[derive(Clone)]
pub struct PermissionEngine {
    features: Arc<dyn FeatureStore>,
    org_features: Arc<dyn OrgFeatureStore>,
    roles: Arc<dyn RoleStore>,
    assignments: Arc<dyn RoleAssignmentStore>,
    overrides: Arc<dyn OverrideStore>,
    resolver: OrganizationFeatureResolver,
    cache: PermissionCache,
    invalidation: Option<CacheInvalidationService>,
}

impl std::fmt::Debug for PermissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionEngine").finish()
    }
}

impl PermissionEngine {
    #[must_use]
    pub fn new(
        features: Arc<dyn FeatureStore>,
        org_features: Arc<dyn OrgFeatureStore>,
        roles: Arc<dyn RoleStore>,
        assignments: Arc<dyn RoleAssignmentStore>,
        overrides: Arc<dyn OverrideStore>,
        cache_max_entries: u64,
        cache_ttl_seconds: u64,
    ) -> Self {
        let resolver = OrganizationFeatureResolver::new(features.clone(), org_features.clone());
        Self {
            features,
            org_features,
            roles,
            assignments,
            overrides,
            resolver,
            cache: PermissionCache::new(cache_max_entries, cache_ttl_seconds),
            invalidation: None,
        }
    }

    /// Attach a cross-replica invalidation broadcaster.
    #[must_use]
    pub fn with_invalidation(mut self, invalidation: CacheInvalidationService) -> Self {
        self.invalidation = Some(invalidation);
        self
    }

    #[must_use]
    pub const fn resolver(&self) -> &OrganizationFeatureResolver {
        &self.resolver
    }

    #[must_use]
    pub const fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    // ==================== Evaluation ====================

    /// Point decision for one feature code.
    ///
    /// Reads the stores directly; the memoized path is [`Self::effective_set`]
    /// and [`Self::check`], which must agree with this algorithm for every
    /// code.
    pub async fn allows(&self, principal: &Principal, code: &str) -> Result<bool> {
        if principal.is_platform_admin {
            return Ok(true);
        }

        let Some(org_id) = &principal.organisation_id else {
            return Ok(false);
        };

        // Organisation enablement is a hard gate; overrides are not consulted
        // for a disabled feature
        if !self.resolver.is_enabled(org_id, code).await? {
            return Ok(false);
        }

        let overrides = self
            .overrides
            .overrides_for(&principal.user_id, org_id)
            .await?;
        if let Some(&granted) = overrides.get(code) {
            return Ok(granted);
        }

        let role_ids = self
            .assignments
            .roles_for(&principal.user_id, org_id)
            .await?;
        if role_ids.is_empty() {
            return Ok(false);
        }

        let roles = self.roles.get_many(&role_ids).await?;
        Ok(roles.iter().any(|role| role.grants(code)))
    }

    /// Fail-closed point decision for call sites that cannot propagate an
    /// error. A store failure is logged and surfaces as a denial, never as an
    /// allow.
    pub async fn allows_or_deny(&self, principal: &Principal, code: &str) -> bool {
        match self.allows(principal, code).await {
            Ok(allowed) => {
                let outcome = if allowed { "allowed" } else { "denied" };
                metrics::DECISIONS_TOTAL.with_label_values(&[outcome]).inc();
                allowed
            }
            Err(e) => {
                metrics::DECISIONS_TOTAL.with_label_values(&["error"]).inc();
                tracing::error!(
                    user_id = %principal.user_id,
                    code = %code,
                    error = %e,
                    "Permission evaluation failed, denying"
                );
                false
            }
        }
    }

    /// The full set of catalog codes the principal can use, memoized per
    /// `(organisation, user)`.
    pub async fn effective_set(&self, principal: &Principal) -> Result<Arc<HashSet<String>>> {
        if principal.is_platform_admin {
            let catalog = self.features.list_all().await?;
            return Ok(Arc::new(catalog.into_iter().map(|f| f.code).collect()));
        }

        let Some(org_id) = &principal.organisation_id else {
            return Ok(Arc::new(HashSet::new()));
        };

        if let Some(cached) = self.cache.get(org_id, &principal.user_id).await {
            return Ok(cached);
        }

        let set = Arc::new(self.compute_effective_set(&principal.user_id, org_id).await?);
        self.cache
            .insert(org_id, &principal.user_id, set.clone())
            .await;

        Ok(set)
    }

    /// Bulk evaluation over the enabled subset of the catalog. Per enabled
    /// code the decision is the same override-then-roles step as
    /// [`Self::allows`]; disabled codes are excluded up front.
    async fn compute_effective_set(
        &self,
        user_id: &UserId,
        org_id: &OrgId,
    ) -> Result<HashSet<String>> {
        let timer = metrics::EVALUATION_DURATION
            .with_label_values(&["bulk"])
            .start_timer();

        let enabled = self.resolver.enabled_set(org_id).await?;
        let overrides = self.overrides.overrides_for(user_id, org_id).await?;
        let role_ids = self.assignments.roles_for(user_id, org_id).await?;
        let roles = self.roles.get_many(&role_ids).await?;

        let mut set = HashSet::new();
        for code in enabled {
            let allowed = overrides
                .get(&code)
                .copied()
                .unwrap_or_else(|| roles.iter().any(|role| role.grants(&code)));
            if allowed {
                set.insert(code);
            }
        }

        timer.observe_duration();
        Ok(set)
    }

    /// Check-and-propagate helper for request handlers: `Ok(())` when the
    /// principal may use the feature, `Error::Authorization` otherwise.
    /// Served from the memoized effective set.
    pub async fn check(&self, principal: &Principal, code: &str) -> Result<()> {
        if principal.is_platform_admin {
            return Ok(());
        }

        if principal.organisation_id.is_none() {
            return Err(Error::Authorization(
                "No active organisation context".to_string(),
            ));
        }

        let set = self.effective_set(principal).await?;
        if set.contains(code) {
            Ok(())
        } else {
            Err(Error::Authorization("Permission denied".to_string()))
        }
    }

    // ==================== Administration (write-through) ====================

    /// Replace an organisation's entire explicit flag set.
    ///
    /// Validation happens before the store is touched; invalidation happens
    /// after the transaction commits and before this call returns.
    pub async fn set_organisation_feature_flags(
        &self,
        organisation_id: &OrgId,
        flags: &HashMap<String, bool>,
    ) -> Result<()> {
        let validator = FeatureCodeValidator::new();
        for code in flags.keys() {
            validator.validate(code)?;
            if !self.features.exists(code).await? {
                return Err(Error::InvalidInput(format!("Unknown feature code: {code}")));
            }
        }

        self.org_features.replace_flags(organisation_id, flags).await?;
        self.invalidate_org(organisation_id).await;

        tracing::debug!(
            org_id = %organisation_id,
            flag_count = flags.len(),
            "Organisation feature flags replaced"
        );
        Ok(())
    }

    /// Replace a user's role set within one organisation.
    pub async fn replace_role_assignments(
        &self,
        user_id: &UserId,
        organisation_id: &OrgId,
        role_ids: &[RoleId],
    ) -> Result<()> {
        let found = self.roles.get_many(role_ids).await?;
        let found_ids: HashSet<&RoleId> = found.iter().map(|role| &role.id).collect();
        for role_id in role_ids {
            if !found_ids.contains(role_id) {
                return Err(Error::InvalidInput(format!("Unknown role: {role_id}")));
            }
        }

        self.assignments
            .replace_roles(user_id, organisation_id, role_ids)
            .await?;
        self.invalidate_principal(organisation_id, user_id).await;

        tracing::debug!(
            user_id = %user_id,
            org_id = %organisation_id,
            role_count = role_ids.len(),
            "Role assignments replaced"
        );
        Ok(())
    }

    /// Replace a principal's full override set. `Inherit` entries clear any
    /// previous row for their code.
    pub async fn replace_permission_overrides(
        &self,
        user_id: &UserId,
        organisation_id: &OrgId,
        entries: &[OverrideEntry],
    ) -> Result<()> {
        let validator = FeatureCodeValidator::new();
        for entry in entries {
            validator.validate(&entry.feature_code)?;
            if !self.features.exists(&entry.feature_code).await? {
                return Err(Error::InvalidInput(format!(
                    "Unknown feature code: {}",
                    entry.feature_code
                )));
            }
        }

        self.overrides
            .replace_overrides(user_id, organisation_id, entries)
            .await?;
        self.invalidate_principal(organisation_id, user_id).await;

        tracing::debug!(
            user_id = %user_id,
            org_id = %organisation_id,
            entry_count = entries.len(),
            "Permission overrides replaced"
        );
        Ok(())
    }

    /// Create a role after validating its name and pattern grammar. A fresh
    /// role grants nothing until assigned, so no invalidation is needed.
    pub async fn create_role(&self, role: &Role) -> Result<()> {
        validate_name("role name", &role.name)?;
        let validator = PatternValidator::new();
        for pattern in &role.permission_patterns {
            validator.validate(&pattern.as_pattern_str())?;
        }

        self.roles.create(role).await
    }

    /// Replace a role's pattern set. The role may be held by any principal in
    /// any organisation, so every cached set is dropped.
    pub async fn replace_role_patterns(
        &self,
        role_id: &RoleId,
        patterns: &[PermissionPattern],
    ) -> Result<()> {
        let validator = PatternValidator::new();
        for pattern in patterns {
            validator.validate(&pattern.as_pattern_str())?;
        }

        self.roles.replace_patterns(role_id, patterns).await?;
        self.invalidate_everything().await;
        Ok(())
    }

    /// Delete a non-system role. Returns false when nothing was removed.
    pub async fn delete_role(&self, role_id: &RoleId) -> Result<bool> {
        let removed = self.roles.delete(role_id).await?;
        if removed {
            self.invalidate_everything().await;
        }
        Ok(removed)
    }

    /// Create an organisation type after validating its patterns.
    pub async fn create_organisation_type(&self, org_type: &OrganisationType) -> Result<()> {
        validate_name("organisation type name", &org_type.name)?;
        let validator = PatternValidator::new();
        for pattern in &org_type.default_feature_patterns {
            validator.validate(&pattern.as_pattern_str())?;
        }

        self.org_features.create_type(org_type).await
    }

    /// Assign an organisation type; changes the org's default enablement.
    pub async fn assign_organisation_type(
        &self,
        organisation_id: &OrgId,
        org_type_id: &OrgTypeId,
    ) -> Result<()> {
        self.org_features
            .assign_type(organisation_id, org_type_id)
            .await?;
        self.invalidate_org(organisation_id).await;
        Ok(())
    }

    /// Unassign an organisation type.
    pub async fn unassign_organisation_type(
        &self,
        organisation_id: &OrgId,
        org_type_id: &OrgTypeId,
    ) -> Result<bool> {
        let removed = self
            .org_features
            .unassign_type(organisation_id, org_type_id)
            .await?;
        if removed {
            self.invalidate_org(organisation_id).await;
        }
        Ok(removed)
    }

    // ==================== Invalidation ====================

    async fn invalidate_principal(&self, organisation_id: &OrgId, user_id: &UserId) {
        self.cache.invalidate(organisation_id, user_id).await;
        if let Some(invalidation) = &self.invalidation {
            if let Err(e) = invalidation
                .invalidate_principal(organisation_id, user_id)
                .await
            {
                tracing::warn!(error = %e, "Failed to broadcast principal invalidation");
            }
        }
    }

    async fn invalidate_org(&self, organisation_id: &OrgId) {
        self.cache.invalidate_org(organisation_id);
        if let Some(invalidation) = &self.invalidation {
            if let Err(e) = invalidation.invalidate_organisation(organisation_id).await {
                tracing::warn!(error = %e, "Failed to broadcast organisation invalidation");
            }
        }
    }

    async fn invalidate_everything(&self) {
        self.cache.invalidate_all();
        if let Some(invalidation) = &self.invalidation {
            if let Err(e) = invalidation.invalidate_everything().await {
                tracing::warn!(error = %e, "Failed to broadcast full invalidation");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{default_feature_catalog, Feature, OverrideState};
    use crate::repository::{
        MemoryFeatureStore, MemoryOrgFeatureStore, MemoryOverrideStore,
        MemoryRoleAssignmentStore, MemoryRoleStore,
    };
    use async_trait::async_trait;

    struct Fixture {
        engine: PermissionEngine,
        org_features: Arc<MemoryOrgFeatureStore>,
    }

    impl Fixture {
        async fn new() -> Self {
            let features = Arc::new(MemoryFeatureStore::with_default_catalog());
            let org_features = Arc::new(MemoryOrgFeatureStore::new());
            let engine = PermissionEngine::new(
                features,
                org_features.clone(),
                Arc::new(MemoryRoleStore::new()),
                Arc::new(MemoryRoleAssignmentStore::new()),
                Arc::new(MemoryOverrideStore::new()),
                PermissionCache::DEFAULT_MAX_ENTRIES,
                PermissionCache::DEFAULT_TTL_SECS,
            );
            Self {
                engine,
                org_features,
            }
        }

        /// Seed a "Producer" style organisation: a type enabling
        /// `production.*`, an Operator role granting `production.create`,
        /// and a user holding that role.
        async fn seed_producer_org(&self) -> (Principal, OrgId, RoleId) {
            let org1 = OrgId::from_string("org000000001".to_string());
            let u1 = UserId::from_string("user000000u1".to_string());

            let producer = OrganisationType::new("Producer", &["production.*"]);
            let type_id = producer.id.clone();
            self.engine
                .create_organisation_type(&producer)
                .await
                .expect("create type");
            self.engine
                .assign_organisation_type(&org1, &type_id)
                .await
                .expect("assign type");

            let operator = Role::new("Operator", &["production.create"]);
            let role_id = operator.id.clone();
            self.engine.create_role(&operator).await.expect("create role");
            self.engine
                .replace_role_assignments(&u1, &org1, &[role_id.clone()])
                .await
                .expect("assign role");

            (Principal::member(u1, org1.clone()), org1, role_id)
        }
    }

    #[tokio::test]
    async fn test_platform_admin_supremacy() {
        let fx = Fixture::new().await;
        let admin = Principal::platform_admin(UserId::from_string("admin0000001".to_string()));

        for feature in default_feature_catalog() {
            assert!(fx.engine.allows(&admin, &feature.code).await.unwrap());
        }
        // No organisation enablement, roles, or overrides are consulted
        assert!(fx.engine.allows(&admin, "production.delete").await.unwrap());
        assert!(fx.engine.check(&admin, "org.roles.manage").await.is_ok());
    }

    #[tokio::test]
    async fn test_no_org_denial() {
        let fx = Fixture::new().await;
        let detached = Principal::detached(UserId::from_string("user0000dtch".to_string()));

        for feature in default_feature_catalog() {
            assert!(!fx.engine.allows(&detached, &feature.code).await.unwrap());
        }
        assert!(fx.engine.effective_set(&detached).await.unwrap().is_empty());
        assert!(matches!(
            fx.engine.check(&detached, "catalog.view").await,
            Err(Error::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn test_gate_precedence_over_override() {
        let engine = crate::test_helpers::engine_with_memory_stores();
        let principal = crate::test_helpers::member_principal("user000000u1", "org000000001");
        let org1 = principal.organisation_id.clone().expect("org context");

        // Grant override on a feature the organisation never enables
        engine
            .replace_permission_overrides(
                &principal.user_id,
                &org1,
                &[OverrideEntry::new("shipment.dispatch", OverrideState::Grant)],
            )
            .await
            .expect("set override");

        assert!(!engine.allows(&principal, "shipment.dispatch").await.unwrap());
        assert!(!engine
            .effective_set(&principal)
            .await
            .unwrap()
            .contains("shipment.dispatch"));
    }

    #[tokio::test]
    async fn test_override_precedence_over_roles() {
        let fx = Fixture::new().await;
        let (principal, org1, _) = fx.seed_producer_org().await;

        // The Operator role grants production.create; a deny override wins
        fx.engine
            .replace_permission_overrides(
                &principal.user_id,
                &org1,
                &[OverrideEntry::new("production.create", OverrideState::Deny)],
            )
            .await
            .expect("set deny");
        assert!(!fx.engine.allows(&principal, "production.create").await.unwrap());

        // No role grants production.edit; a grant override wins (org enables
        // it via the Producer type)
        fx.engine
            .replace_permission_overrides(
                &principal.user_id,
                &org1,
                &[OverrideEntry::new("production.edit", OverrideState::Grant)],
            )
            .await
            .expect("set grant");
        assert!(fx.engine.allows(&principal, "production.edit").await.unwrap());
        // The deny was replaced away; the role grant applies again
        assert!(fx.engine.allows(&principal, "production.create").await.unwrap());
    }

    #[tokio::test]
    async fn test_wildcard_role_grants_category() {
        let fx = Fixture::new().await;
        let org1 = OrgId::from_string("org000000001".to_string());
        let u1 = UserId::from_string("user000000u1".to_string());
        let principal = Principal::member(u1.clone(), org1.clone());

        let full = OrganisationType::new("Enterprise", &["*"]);
        let type_id = full.id.clone();
        fx.engine.create_organisation_type(&full).await.expect("create type");
        fx.engine
            .assign_organisation_type(&org1, &type_id)
            .await
            .expect("assign type");

        let production_lead = Role::new("Production Lead", &["production.*"]);
        let role_id = production_lead.id.clone();
        fx.engine.create_role(&production_lead).await.expect("create role");
        fx.engine
            .replace_role_assignments(&u1, &org1, &[role_id])
            .await
            .expect("assign role");

        assert!(fx.engine.allows(&principal, "production.create").await.unwrap());
        assert!(fx.engine.allows(&principal, "production.delete").await.unwrap());
        assert!(!fx.engine.allows(&principal, "inventory.view").await.unwrap());
    }

    #[tokio::test]
    async fn test_bulk_point_equivalence() {
        let fx = Fixture::new().await;
        let (member, org1, _) = fx.seed_producer_org().await;

        // Skew the state: one deny override, one grant override, one
        // explicit flag disabling a type-enabled code
        fx.engine
            .replace_permission_overrides(
                &member.user_id,
                &org1,
                &[
                    OverrideEntry::new("production.create", OverrideState::Deny),
                    OverrideEntry::new("production.delete", OverrideState::Grant),
                ],
            )
            .await
            .expect("set overrides");
        fx.engine
            .set_organisation_feature_flags(
                &org1,
                &HashMap::from([
                    ("production.delete".to_string(), false),
                    ("inventory.view".to_string(), true),
                ]),
            )
            .await
            .expect("set flags");

        let admin = Principal::platform_admin(UserId::from_string("admin0000001".to_string()));
        let detached = Principal::detached(UserId::from_string("user0000dtch".to_string()));
        let stranger = Principal::member(
            UserId::from_string("user0000strn".to_string()),
            org1.clone(),
        );

        for principal in [&member, &admin, &detached, &stranger] {
            let bulk = fx.engine.effective_set(principal).await.unwrap();
            for feature in default_feature_catalog() {
                let point = fx.engine.allows(principal, &feature.code).await.unwrap();
                assert_eq!(
                    bulk.contains(&feature.code),
                    point,
                    "bulk/point divergence for {} on {}",
                    principal.user_id,
                    feature.code
                );
            }
        }
    }

    #[tokio::test]
    async fn test_producer_scenario_end_to_end() {
        let fx = Fixture::new().await;
        let (u1, org1, _) = fx.seed_producer_org().await;

        // Org enables production.* via type default; the role grants create
        assert!(fx.engine.allows(&u1, "production.create").await.unwrap());
        // Enabled by the org but granted by nothing
        assert!(!fx.engine.allows(&u1, "production.delete").await.unwrap());

        // A grant override flips it
        fx.engine
            .replace_permission_overrides(
                &u1.user_id,
                &org1,
                &[OverrideEntry::new("production.delete", OverrideState::Grant)],
            )
            .await
            .expect("set override");
        assert!(fx.engine.allows(&u1, "production.delete").await.unwrap());
        assert!(fx
            .engine
            .effective_set(&u1)
            .await
            .unwrap()
            .contains("production.delete"));

        // Explicitly disabling the feature at the org level wins over the
        // still-present grant override
        fx.engine
            .set_organisation_feature_flags(
                &org1,
                &HashMap::from([("production.delete".to_string(), false)]),
            )
            .await
            .expect("disable feature");
        assert!(!fx.engine.allows(&u1, "production.delete").await.unwrap());
        // The memoized path was invalidated by the flag write
        assert!(!fx
            .engine
            .effective_set(&u1)
            .await
            .unwrap()
            .contains("production.delete"));
        // The override row still exists and takes effect again if the flag
        // set is cleared
        fx.engine
            .set_organisation_feature_flags(&org1, &HashMap::new())
            .await
            .expect("clear flags");
        assert!(fx.engine.allows(&u1, "production.delete").await.unwrap());
    }

    #[tokio::test]
    async fn test_role_scoping_across_organisations() {
        let fx = Fixture::new().await;
        let (u1, _org1, role_id) = fx.seed_producer_org().await;

        // The same user in another organisation holds nothing there
        let org_b = OrgId::from_string("org00000000b".to_string());
        let producer_b = OrganisationType::new("Producer", &["production.*"]);
        let type_b = producer_b.id.clone();
        fx.engine.create_organisation_type(&producer_b).await.expect("create type");
        fx.engine
            .assign_organisation_type(&org_b, &type_b)
            .await
            .expect("assign type");

        let in_org_b = Principal::member(u1.user_id.clone(), org_b.clone());
        assert!(!fx.engine.allows(&in_org_b, "production.create").await.unwrap());

        // Assigning the role in org B changes org B only
        fx.engine
            .replace_role_assignments(&u1.user_id, &org_b, &[role_id])
            .await
            .expect("assign in org B");
        assert!(fx.engine.allows(&in_org_b, "production.create").await.unwrap());
        assert!(fx.engine.allows(&u1, "production.create").await.unwrap());
    }

    #[tokio::test]
    async fn test_cached_set_invalidated_by_every_write_path() {
        let fx = Fixture::new().await;
        let (u1, org1, role_id) = fx.seed_producer_org().await;

        // Prime the cache
        assert!(fx.engine.check(&u1, "production.create").await.is_ok());

        // Role un-assignment must be visible immediately
        fx.engine
            .replace_role_assignments(&u1.user_id, &org1, &[])
            .await
            .expect("clear roles");
        assert!(fx.engine.check(&u1, "production.create").await.is_err());

        // Re-assign and prime again
        fx.engine
            .replace_role_assignments(&u1.user_id, &org1, &[role_id.clone()])
            .await
            .expect("re-assign");
        assert!(fx.engine.check(&u1, "production.create").await.is_ok());

        // Role pattern replacement must be visible immediately
        fx.engine
            .replace_role_patterns(&role_id, &[PermissionPattern::parse("reports.view")])
            .await
            .expect("replace patterns");
        assert!(fx.engine.check(&u1, "production.create").await.is_err());

        // Type un-assignment closes the org gate for the whole category
        fx.engine
            .replace_role_patterns(&role_id, &[PermissionPattern::parse("production.*")])
            .await
            .expect("restore patterns");
        assert!(fx.engine.check(&u1, "production.edit").await.is_ok());
        let types = fx.org_features.types_for(&org1).await.expect("types");
        fx.engine
            .unassign_organisation_type(&org1, &types[0].id)
            .await
            .expect("unassign type");
        assert!(fx.engine.check(&u1, "production.edit").await.is_err());
    }

    #[tokio::test]
    async fn test_write_paths_reject_unknown_references() {
        let fx = Fixture::new().await;
        let org1 = OrgId::from_string("org000000001".to_string());
        let u1 = UserId::from_string("user000000u1".to_string());

        // Unknown feature code in a flag map
        let err = fx
            .engine
            .set_organisation_feature_flags(
                &org1,
                &HashMap::from([("no.such_feature".to_string(), true)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // Malformed feature code in an override list
        let err = fx
            .engine
            .replace_permission_overrides(
                &u1,
                &org1,
                &[OverrideEntry::new("NotACode", OverrideState::Grant)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // Unknown role in an assignment list
        let err = fx
            .engine
            .replace_role_assignments(&u1, &org1, &[RoleId::new()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    mockall::mock! {
        UnavailableFeatures {}

        #[async_trait]
        impl FeatureStore for UnavailableFeatures {
            async fn list_all(&self) -> Result<Vec<Feature>>;
            async fn exists(&self, code: &str) -> Result<bool>;
        }
    }

    mockall::mock! {
        UnavailableOverrides {}

        #[async_trait]
        impl OverrideStore for UnavailableOverrides {
            async fn overrides_for(
                &self,
                user_id: &UserId,
                organisation_id: &OrgId,
            ) -> Result<HashMap<String, bool>>;

            async fn replace_overrides(
                &self,
                user_id: &UserId,
                organisation_id: &OrgId,
                entries: &[OverrideEntry],
            ) -> Result<()>;
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let mut failing_features = MockUnavailableFeatures::new();
        failing_features
            .expect_list_all()
            .returning(|| Err(Error::Database(sqlx::Error::PoolClosed)));
        failing_features
            .expect_exists()
            .returning(|_| Err(Error::Database(sqlx::Error::PoolClosed)));

        let mut failing_overrides = MockUnavailableOverrides::new();
        failing_overrides
            .expect_overrides_for()
            .returning(|_, _| Err(Error::Database(sqlx::Error::PoolClosed)));

        let org_features = Arc::new(MemoryOrgFeatureStore::new());
        let engine = PermissionEngine::new(
            Arc::new(failing_features),
            org_features.clone(),
            Arc::new(MemoryRoleStore::new()),
            Arc::new(MemoryRoleAssignmentStore::new()),
            Arc::new(failing_overrides),
            PermissionCache::DEFAULT_MAX_ENTRIES,
            PermissionCache::DEFAULT_TTL_SECS,
        );

        let org1 = OrgId::from_string("org000000001".to_string());
        let u1 = UserId::from_string("user000000u1".to_string());
        let principal = Principal::member(u1.clone(), org1.clone());

        // Force the org gate open so evaluation reaches the failing stores
        let producer = OrganisationType::new("Producer", &["*"]);
        let type_id = producer.id.clone();
        org_features.create_type(&producer).await.expect("create type");
        org_features.assign_type(&org1, &type_id).await.expect("assign type");

        // Both paths surface the infrastructure error rather than silently
        // granting or denying
        let err = engine.allows(&principal, "production.create").await.unwrap_err();
        assert!(err.is_store_unavailable());
        let err = engine.effective_set(&principal).await.unwrap_err();
        assert!(err.is_store_unavailable());

        // The fail-closed wrapper denies
        assert!(!engine.allows_or_deny(&principal, "production.create").await);

        // Platform admins are not exempt from infrastructure failures on the
        // bulk path: the catalog read error propagates
        let admin = Principal::platform_admin(u1);
        assert!(engine.effective_set(&admin).await.is_err());
    }
}
