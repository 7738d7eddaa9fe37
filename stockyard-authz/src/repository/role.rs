use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

use super::{RoleAssignmentStore, RoleStore};
use crate::models::{OrgId, PermissionPattern, Role, RoleId, UserId};
use crate::transaction::with_transaction;
use crate::Result;

/// Role definition repository for database operations
#[derive(Clone)]
pub struct PgRoleStore {
    pool: PgPool,
}

impl PgRoleStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn roles_from_rows(&self, rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<Role>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut roles = Vec::with_capacity(rows.len());
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            ids.push(id.clone());
            roles.push(Role {
                id: RoleId::from_string(id),
                name: row.try_get("name")?,
                description: row.try_get("description")?,
                is_system: row.try_get("is_system")?,
                permission_patterns: Vec::new(),
            });
        }

        let pattern_rows = sqlx::query(
            "SELECT role_id, pattern
             FROM role_permission_patterns
             WHERE role_id = ANY($1)
             ORDER BY role_id, position ASC",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut patterns: HashMap<String, Vec<PermissionPattern>> = HashMap::new();
        for row in pattern_rows {
            let role_id: String = row.try_get("role_id")?;
            let raw: String = row.try_get("pattern")?;
            patterns
                .entry(role_id)
                .or_default()
                .push(PermissionPattern::parse(&raw));
        }

        for role in &mut roles {
            if let Some(p) = patterns.remove(role.id.as_str()) {
                role.permission_patterns = p;
            }
        }

        Ok(roles)
    }
}

#[async_trait]
impl RoleStore for PgRoleStore {
    async fn get(&self, role_id: &RoleId) -> Result<Option<Role>> {
        let rows = sqlx::query(
            "SELECT id, name, description, is_system
             FROM roles
             WHERE id = $1",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(self.roles_from_rows(rows).await?.into_iter().next())
    }

    async fn get_many(&self, role_ids: &[RoleId]) -> Result<Vec<Role>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = role_ids.iter().map(|id| id.0.clone()).collect();
        let rows = sqlx::query(
            "SELECT id, name, description, is_system
             FROM roles
             WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        self.roles_from_rows(rows).await
    }

    async fn list_all(&self) -> Result<Vec<Role>> {
        let rows = sqlx::query(
            "SELECT id, name, description, is_system
             FROM roles
             ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        self.roles_from_rows(rows).await
    }

    async fn create(&self, role: &Role) -> Result<()> {
        let role_id = role.id.0.clone();
        let name = role.name.clone();
        let description = role.description.clone();
        let is_system = role.is_system;
        let patterns: Vec<String> = role
            .permission_patterns
            .iter()
            .map(PermissionPattern::as_pattern_str)
            .collect();

        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                sqlx::query(
                    "INSERT INTO roles (id, name, description, is_system)
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(&role_id)
                .bind(&name)
                .bind(&description)
                .bind(is_system)
                .execute(&mut **tx)
                .await?;

                for (position, pattern) in patterns.iter().enumerate() {
                    sqlx::query(
                        "INSERT INTO role_permission_patterns (role_id, position, pattern)
                         VALUES ($1, $2, $3)",
                    )
                    .bind(&role_id)
                    .bind(position as i32)
                    .bind(pattern)
                    .execute(&mut **tx)
                    .await?;
                }

                Ok(())
            })
        })
        .await
    }

    async fn replace_patterns(
        &self,
        role_id: &RoleId,
        patterns: &[PermissionPattern],
    ) -> Result<()> {
        let role_id = role_id.0.clone();
        let patterns: Vec<String> = patterns.iter().map(PermissionPattern::as_pattern_str).collect();

        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                sqlx::query(
                    "DELETE FROM role_permission_patterns
                     WHERE role_id = $1",
                )
                .bind(&role_id)
                .execute(&mut **tx)
                .await?;

                for (position, pattern) in patterns.iter().enumerate() {
                    sqlx::query(
                        "INSERT INTO role_permission_patterns (role_id, position, pattern)
                         VALUES ($1, $2, $3)",
                    )
                    .bind(&role_id)
                    .bind(position as i32)
                    .bind(pattern)
                    .execute(&mut **tx)
                    .await?;
                }

                Ok(())
            })
        })
        .await
    }

    async fn delete(&self, role_id: &RoleId) -> Result<bool> {
        // System roles are seeded by the platform and never deleted
        let result = sqlx::query(
            "DELETE FROM roles
             WHERE id = $1 AND NOT is_system",
        )
        .bind(role_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Role assignment repository for database operations
#[derive(Clone)]
pub struct PgRoleAssignmentStore {
    pool: PgPool,
}

impl PgRoleAssignmentStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleAssignmentStore for PgRoleAssignmentStore {
    async fn roles_for(&self, user_id: &UserId, organisation_id: &OrgId) -> Result<Vec<RoleId>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT role_id
             FROM role_assignments
             WHERE user_id = $1 AND organisation_id = $2
             ORDER BY assigned_at ASC",
        )
        .bind(user_id)
        .bind(organisation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RoleId::from_string).collect())
    }

    async fn replace_roles(
        &self,
        user_id: &UserId,
        organisation_id: &OrgId,
        role_ids: &[RoleId],
    ) -> Result<()> {
        let user_id = user_id.0.clone();
        let org_id = organisation_id.0.clone();
        let role_ids: Vec<String> = role_ids.iter().map(|id| id.0.clone()).collect();
        let now = chrono::Utc::now();

        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                // Scoped strictly to the (user, organisation) pair; the same
                // user's assignments in other organisations are untouched.
                sqlx::query(
                    "DELETE FROM role_assignments
                     WHERE user_id = $1 AND organisation_id = $2",
                )
                .bind(&user_id)
                .bind(&org_id)
                .execute(&mut **tx)
                .await?;

                for role_id in &role_ids {
                    sqlx::query(
                        "INSERT INTO role_assignments
                            (user_id, organisation_id, role_id, assigned_at)
                         VALUES ($1, $2, $3, $4)
                         ON CONFLICT (user_id, organisation_id, role_id) DO NOTHING",
                    )
                    .bind(&user_id)
                    .bind(&org_id)
                    .bind(role_id)
                    .bind(now)
                    .execute(&mut **tx)
                    .await?;
                }

                Ok(())
            })
        })
        .await
    }
}
