//! Input validation for feature codes, permission patterns, and entity IDs.
//!
//! Validation runs before any store mutation; malformed input never reaches a
//! repository.

// ============================================================================
// Canonical validation limits, single source of truth for the entire codebase
// ============================================================================

/// Minimum feature code length ("a.b")
pub const FEATURE_CODE_MIN: usize = 3;
/// Maximum feature code length
pub const FEATURE_CODE_MAX: usize = 100;

/// Entity IDs are 12-character nanoids
pub const ENTITY_ID_LEN: usize = 12;

/// Maximum role/organisation-type name length
pub const NAME_MAX: usize = 100;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid {field}: {message}")]
    Field { field: String, message: String },
}

/// Validation result
pub type ValidationResult<T> = Result<T, ValidationError>;

fn field_error(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::Field {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Feature code validator
///
/// Codes are lowercase, dot-namespaced, at least two segments
/// (`"production.create"`). Segments contain only `[a-z0-9_]`.
pub struct FeatureCodeValidator {
    max_length: usize,
}

impl Default for FeatureCodeValidator {
    fn default() -> Self {
        Self {
            max_length: FEATURE_CODE_MAX,
        }
    }
}

impl FeatureCodeValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self, code: &str) -> ValidationResult<()> {
        if code.len() < FEATURE_CODE_MIN {
            return Err(field_error(
                "feature_code",
                format!("must be at least {FEATURE_CODE_MIN} characters"),
            ));
        }
        if code.len() > self.max_length {
            return Err(field_error(
                "feature_code",
                format!("must be at most {} characters", self.max_length),
            ));
        }

        let segments: Vec<&str> = code.split('.').collect();
        if segments.len() < 2 {
            return Err(field_error(
                "feature_code",
                "must be dot-namespaced (e.g. \"production.create\")",
            ));
        }

        for segment in segments {
            if segment.is_empty() {
                return Err(field_error("feature_code", "contains an empty segment"));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            {
                return Err(field_error(
                    "feature_code",
                    "segments may only contain lowercase letters, digits, and underscores",
                ));
            }
        }

        Ok(())
    }
}

/// Permission pattern validator
///
/// Accepts `"*"`, `"<category>.*"` with a valid category prefix, or a valid
/// feature code.
pub struct PatternValidator {
    code_validator: FeatureCodeValidator,
}

impl Default for PatternValidator {
    fn default() -> Self {
        Self {
            code_validator: FeatureCodeValidator::new(),
        }
    }
}

impl PatternValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self, pattern: &str) -> ValidationResult<()> {
        if pattern == "*" {
            return Ok(());
        }

        if let Some(prefix) = pattern.strip_suffix(".*") {
            if prefix.is_empty() {
                return Err(field_error("pattern", "category wildcard has no category"));
            }
            for segment in prefix.split('.') {
                if segment.is_empty() {
                    return Err(field_error("pattern", "contains an empty segment"));
                }
                if !segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
                {
                    return Err(field_error(
                        "pattern",
                        "segments may only contain lowercase letters, digits, and underscores",
                    ));
                }
            }
            return Ok(());
        }

        self.code_validator
            .validate(pattern)
            .map_err(|_| field_error("pattern", format!("\"{pattern}\" is not a valid pattern")))
    }
}

/// Validate a 12-character nanoid entity ID.
pub fn validate_entity_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.len() != ENTITY_ID_LEN {
        return Err(field_error(
            field,
            format!("must be exactly {ENTITY_ID_LEN} characters"),
        ));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(field_error(field, "contains invalid characters"));
    }
    Ok(())
}

/// Validate a human-facing name (role, organisation type).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    if name.trim().is_empty() {
        return Err(field_error(field, "must not be empty"));
    }
    if name.len() > NAME_MAX {
        return Err(field_error(
            field,
            format!("must be at most {NAME_MAX} characters"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_code_validator() {
        let v = FeatureCodeValidator::new();
        assert!(v.validate("production.create").is_ok());
        assert!(v.validate("org.members.manage").is_ok());
        assert!(v.validate("a_1.b_2").is_ok());

        assert!(v.validate("").is_err());
        assert!(v.validate("production").is_err());
        assert!(v.validate("Production.Create").is_err());
        assert!(v.validate("production..create").is_err());
        assert!(v.validate("production.create!").is_err());
        assert!(v.validate(&"x.".repeat(100)).is_err());
    }

    #[test]
    fn test_pattern_validator() {
        let v = PatternValidator::new();
        assert!(v.validate("*").is_ok());
        assert!(v.validate("production.*").is_ok());
        assert!(v.validate("org.members.*").is_ok());
        assert!(v.validate("production.create").is_ok());

        assert!(v.validate(".*").is_err());
        assert!(v.validate("Production.*").is_err());
        assert!(v.validate("production*").is_err());
        assert!(v.validate("production").is_err());
    }

    #[test]
    fn test_entity_id() {
        assert!(validate_entity_id("role_id", "AbCd1234_-xY").is_ok());
        assert!(validate_entity_id("role_id", "short").is_err());
        assert!(validate_entity_id("role_id", "bad!chars!!!").is_err());
    }

    #[test]
    fn test_name() {
        assert!(validate_name("name", "Operator").is_ok());
        assert!(validate_name("name", "  ").is_err());
        assert!(validate_name("name", &"x".repeat(101)).is_err());
    }
}
