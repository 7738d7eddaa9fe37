pub mod invalidation;
pub mod permission_cache;

pub use invalidation::{CacheInvalidationService, InvalidationMessage, CACHE_INVALIDATION_CHANNEL};
pub use permission_cache::PermissionCache;
