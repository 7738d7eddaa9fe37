//! The resolved identity context an authorization decision is evaluated
//! against.
//!
//! Principals are produced by the upstream auth boundary after
//! authentication and organisation selection; they are evaluation input, not
//! persisted state. Platform admin is an explicit boolean here, never
//! inferred from a role or a null organisation.

use serde::{Deserialize, Serialize};

use super::id::{OrgId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    /// The active organisation context, if any. A non-admin principal with no
    /// organisation is granted nothing.
    pub organisation_id: Option<OrgId>,
    pub is_platform_admin: bool,
}

impl Principal {
    /// A regular member acting inside an organisation.
    pub fn member(user_id: UserId, organisation_id: OrgId) -> Self {
        Self {
            user_id,
            organisation_id: Some(organisation_id),
            is_platform_admin: false,
        }
    }

    /// A platform administrator. May or may not carry an organisation
    /// context; it is irrelevant to evaluation.
    pub const fn platform_admin(user_id: UserId) -> Self {
        Self {
            user_id,
            organisation_id: None,
            is_platform_admin: true,
        }
    }

    /// An authenticated user with no active organisation.
    pub const fn detached(user_id: UserId) -> Self {
        Self {
            user_id,
            organisation_id: None,
            is_platform_admin: false,
        }
    }
}
