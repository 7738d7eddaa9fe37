//! Organisation types and their default feature bundles.

use serde::{Deserialize, Serialize};

use super::id::OrgTypeId;
use super::pattern::PermissionPattern;

/// A tag on an organisation that supplies a default bundle of enabled feature
/// patterns. An organisation may carry zero, one, or several types; its
/// default feature set is the pattern-expanded union over all assigned types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganisationType {
    pub id: OrgTypeId,
    pub name: String,
    /// Ordered; order is preserved for administration UIs, matching is
    /// order-independent.
    pub default_feature_patterns: Vec<PermissionPattern>,
}

impl OrganisationType {
    pub fn new(name: &str, patterns: &[&str]) -> Self {
        Self {
            id: OrgTypeId::new(),
            name: name.to_string(),
            default_feature_patterns: patterns
                .iter()
                .map(|raw| PermissionPattern::parse(raw))
                .collect(),
        }
    }

    /// Whether any of this type's default patterns matches the code.
    #[must_use]
    pub fn enables(&self, code: &str) -> bool {
        super::pattern::any_matches(&self.default_feature_patterns, code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_enables_via_patterns() {
        let producer = OrganisationType::new("Producer", &["production.*", "catalog.view"]);
        assert!(producer.enables("production.create"));
        assert!(producer.enables("catalog.view"));
        assert!(!producer.enables("catalog.edit"));
        assert!(!producer.enables("shipment.view"));
    }

    #[test]
    fn test_type_with_global_wildcard() {
        let full = OrganisationType::new("Enterprise", &["*"]);
        assert!(full.enables("anything.at_all"));
    }
}
