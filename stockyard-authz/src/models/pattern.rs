//! Feature-code pattern grammar shared by organisation-type defaults and role
//! permission grants.
//!
//! A pattern is one of:
//! - `"*"`: matches every feature code
//! - `"<category>.*"`: matches codes starting with `"<category>."`
//! - anything else: exact, case-sensitive code comparison
//!
//! Codes are assumed already normalized (lowercase, dot-separated) by the
//! catalog; the matcher never normalizes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PermissionPattern {
    /// `"*"`: every feature code
    All,
    /// `"<category>.*"`: the stored prefix keeps the trailing dot
    Category(String),
    /// An exact feature code
    Exact(String),
}

impl PermissionPattern {
    /// Classify a raw pattern string. Never fails; anything that is not a
    /// wildcard form is an exact-code pattern.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw == "*" {
            Self::All
        } else if let Some(prefix) = raw.strip_suffix('*') {
            if prefix.ends_with('.') {
                Self::Category(prefix.to_string())
            } else {
                Self::Exact(raw.to_string())
            }
        } else {
            Self::Exact(raw.to_string())
        }
    }

    /// Whether this pattern matches the concrete feature code.
    #[must_use]
    pub fn matches(&self, code: &str) -> bool {
        match self {
            Self::All => true,
            Self::Category(prefix) => code.starts_with(prefix.as_str()),
            Self::Exact(exact) => exact == code,
        }
    }

    /// The raw pattern string as stored in the database.
    #[must_use]
    pub fn as_pattern_str(&self) -> String {
        match self {
            Self::All => "*".to_string(),
            Self::Category(prefix) => format!("{prefix}*"),
            Self::Exact(exact) => exact.clone(),
        }
    }
}

/// Whether any pattern in the set matches the code.
#[must_use]
pub fn any_matches(patterns: &[PermissionPattern], code: &str) -> bool {
    patterns.iter().any(|p| p.matches(code))
}

impl std::fmt::Display for PermissionPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_pattern_str())
    }
}

impl From<String> for PermissionPattern {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&str> for PermissionPattern {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<PermissionPattern> for String {
    fn from(p: PermissionPattern) -> Self {
        p.as_pattern_str()
    }
}
