//! Gateable feature definitions.
//!
//! Every gateable capability of the platform is identified by a dot-namespaced
//! code (e.g. `"production.create"`); the segment before the first dot is the
//! category. Codes are immutable once referenced by a role or override.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
}

impl Feature {
    pub fn new(code: &str, name: &str, description: Option<&str>) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            category: category_of(code).to_string(),
        }
    }
}

/// The category segment of a feature code (everything before the first dot,
/// or the whole code if it has none).
#[must_use]
pub fn category_of(code: &str) -> &str {
    code.split_once('.').map_or(code, |(category, _)| category)
}

/// The platform's seed catalog. Administered out-of-band after first boot;
/// tests and the in-memory store use it directly.
#[must_use]
pub fn default_feature_catalog() -> Vec<Feature> {
    vec![
        Feature::new("catalog.view", "View product catalog", None),
        Feature::new("catalog.edit", "Edit product catalog", None),
        Feature::new(
            "production.create",
            "Create production batches",
            Some("Register new production output against catalog products"),
        ),
        Feature::new("production.edit", "Edit production batches", None),
        Feature::new("production.delete", "Delete production batches", None),
        Feature::new("shipment.view", "View shipments", None),
        Feature::new("shipment.create", "Create shipments", None),
        Feature::new("shipment.edit", "Edit shipments", None),
        Feature::new("shipment.delete", "Delete shipments", None),
        Feature::new(
            "shipment.dispatch",
            "Dispatch shipments",
            Some("Mark a shipment as handed over to the carrier"),
        ),
        Feature::new("inventory.view", "View inventory", None),
        Feature::new("inventory.adjust", "Adjust inventory levels", None),
        Feature::new("inventory.transfer", "Transfer inventory between sites", None),
        Feature::new("org.members.manage", "Manage organisation members", None),
        Feature::new("org.roles.manage", "Manage organisation roles", None),
        Feature::new("org.settings.manage", "Manage organisation settings", None),
        Feature::new("reports.view", "View reports", None),
        Feature::new("reports.export", "Export reports", None),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_of() {
        assert_eq!(category_of("production.create"), "production");
        assert_eq!(category_of("org.members.manage"), "org");
        assert_eq!(category_of("standalone"), "standalone");
    }

    #[test]
    fn test_default_catalog_codes_are_unique_and_namespaced() {
        let catalog = default_feature_catalog();
        let mut codes: Vec<_> = catalog.iter().map(|f| f.code.as_str()).collect();
        codes.sort_unstable();
        let before = codes.len();
        codes.dedup();
        assert_eq!(before, codes.len());

        for feature in &catalog {
            assert!(feature.code.contains('.'), "code {} lacks a category", feature.code);
            assert_eq!(feature.category, category_of(&feature.code));
        }
    }
}
