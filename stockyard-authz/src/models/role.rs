//! Roles and role assignments.

use serde::{Deserialize, Serialize};

use super::id::RoleId;
use super::pattern::PermissionPattern;

/// A named bundle of permission patterns, assignable to a user within one
/// organisation. System roles are seeded by the platform and cannot be
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub permission_patterns: Vec<PermissionPattern>,
}

impl Role {
    pub fn new(name: &str, patterns: &[&str]) -> Self {
        Self {
            id: RoleId::new(),
            name: name.to_string(),
            description: None,
            is_system: false,
            permission_patterns: patterns
                .iter()
                .map(|raw| PermissionPattern::parse(raw))
                .collect(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    #[must_use]
    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }

    /// Whether any of this role's patterns matches the feature code.
    #[must_use]
    pub fn grants(&self, code: &str) -> bool {
        super::pattern::any_matches(&self.permission_patterns, code)
    }
}
