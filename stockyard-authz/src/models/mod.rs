pub mod feature;
pub mod id;
pub mod org;
pub mod override_entry;
pub mod pattern;
pub mod principal;
pub mod role;

pub use feature::{category_of, default_feature_catalog, Feature};
pub use id::{generate_id, OrgId, OrgTypeId, RoleId, UserId};
pub use org::OrganisationType;
pub use override_entry::{OverrideEntry, OverrideState};
pub use pattern::{any_matches, PermissionPattern};
pub use principal::Principal;
pub use role::Role;
