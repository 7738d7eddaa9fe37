//! Effective-permission set cache.
//!
//! Memoizes the effective feature set per `(organisation, user)` principal.
//! Keys embed the organisation first so a flag or type change can invalidate
//! every principal of an organisation by key prefix, without enumerating its
//! users.

use moka::future::Cache;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::metrics;
use crate::models::{OrgId, UserId};

#[derive(Clone)]
pub struct PermissionCache {
    cache: Cache<String, Arc<HashSet<String>>>,
}

impl PermissionCache {
    /// Default permission cache capacity (max entries)
    pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;
    /// Default permission cache TTL in seconds (5 minutes)
    pub const DEFAULT_TTL_SECS: u64 = 300;

    #[must_use]
    pub fn new(max_entries: u64, ttl_seconds: u64) -> Self {
        Self {
            cache: moka::future::CacheBuilder::new(max_entries)
                .time_to_live(Duration::from_secs(ttl_seconds))
                .support_invalidation_closures()
                .build(),
        }
    }

    /// Generate cache key for organisation + user
    fn cache_key(organisation_id: &OrgId, user_id: &UserId) -> String {
        format!("{}:{}", organisation_id.0, user_id.0)
    }

    pub async fn get(
        &self,
        organisation_id: &OrgId,
        user_id: &UserId,
    ) -> Option<Arc<HashSet<String>>> {
        let key = Self::cache_key(organisation_id, user_id);
        match self.cache.get(&key).await {
            Some(set) => {
                metrics::CACHE_HITS.with_label_values(&["permission"]).inc();
                Some(set)
            }
            None => {
                metrics::CACHE_MISSES.with_label_values(&["permission"]).inc();
                None
            }
        }
    }

    pub async fn insert(
        &self,
        organisation_id: &OrgId,
        user_id: &UserId,
        set: Arc<HashSet<String>>,
    ) {
        let key = Self::cache_key(organisation_id, user_id);
        self.cache.insert(key, set).await;
    }

    /// Invalidate the cached set for a single principal.
    pub async fn invalidate(&self, organisation_id: &OrgId, user_id: &UserId) {
        let key = Self::cache_key(organisation_id, user_id);
        self.cache.invalidate(&key).await;
    }

    /// Invalidate every principal of an organisation. Called when
    /// organisation-level enablement changes (explicit flags or type
    /// assignments), since those affect all members' effective sets.
    pub fn invalidate_org(&self, organisation_id: &OrgId) {
        let prefix = format!("{}:", organisation_id.0);
        if let Err(e) = self
            .cache
            .invalidate_entries_if(move |key, _| key.starts_with(&prefix))
        {
            tracing::warn!(error = %e, "Failed to invalidate organisation cache entries");
        }
    }

    /// Clear the whole cache.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl std::fmt::Debug for PermissionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCache")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}
