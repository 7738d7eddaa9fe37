//! Per-user, per-organisation, per-feature permission overrides.
//!
//! An override is authoritative within an enabled feature: a grant allows the
//! feature even when no role grants it, a deny blocks it even when a role
//! does. Overrides never defeat the organisation-level gate.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Desired override state as submitted by administration UIs.
///
/// `Inherit` means "no row": the decision falls back to the user's roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideState {
    Inherit,
    Grant,
    Deny,
}

impl OverrideState {
    /// The persisted flag value, if any. `Inherit` entries are not persisted.
    #[must_use]
    pub const fn as_flag(self) -> Option<bool> {
        match self {
            Self::Inherit => None,
            Self::Grant => Some(true),
            Self::Deny => Some(false),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inherit => "inherit",
            Self::Grant => "grant",
            Self::Deny => "deny",
        }
    }
}

impl FromStr for OverrideState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inherit" => Ok(Self::Inherit),
            "grant" => Ok(Self::Grant),
            "deny" => Ok(Self::Deny),
            _ => Err(format!("Unknown override state: {s}")),
        }
    }
}

impl std::fmt::Display for OverrideState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of a full-override replacement request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideEntry {
    pub feature_code: String,
    pub state: OverrideState,
}

impl OverrideEntry {
    pub fn new(feature_code: &str, state: OverrideState) -> Self {
        Self {
            feature_code: feature_code.to_string(),
            state,
        }
    }
}
