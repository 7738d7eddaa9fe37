use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

use super::OrgFeatureStore;
use crate::models::{OrgId, OrgTypeId, OrganisationType, PermissionPattern};
use crate::transaction::with_transaction;
use crate::Result;

/// Organisation feature repository: explicit per-org flags plus
/// organisation-type assignments and their default patterns.
#[derive(Clone)]
pub struct PgOrgFeatureStore {
    pool: PgPool,
}

impl PgOrgFeatureStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attach the stored default patterns to a set of type rows.
    async fn load_patterns(
        &self,
        types: Vec<(OrgTypeId, String)>,
    ) -> Result<Vec<OrganisationType>> {
        if types.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = types.iter().map(|(id, _)| id.0.clone()).collect();
        let rows = sqlx::query(
            "SELECT org_type_id, pattern
             FROM organisation_type_patterns
             WHERE org_type_id = ANY($1)
             ORDER BY org_type_id, position ASC",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut patterns: HashMap<String, Vec<PermissionPattern>> = HashMap::new();
        for row in rows {
            let type_id: String = row.try_get("org_type_id")?;
            let raw: String = row.try_get("pattern")?;
            patterns
                .entry(type_id)
                .or_default()
                .push(PermissionPattern::parse(&raw));
        }

        Ok(types
            .into_iter()
            .map(|(id, name)| {
                let default_feature_patterns = patterns.remove(id.as_str()).unwrap_or_default();
                OrganisationType {
                    id,
                    name,
                    default_feature_patterns,
                }
            })
            .collect())
    }
}

#[async_trait]
impl OrgFeatureStore for PgOrgFeatureStore {
    async fn flag_for(&self, organisation_id: &OrgId, code: &str) -> Result<Option<bool>> {
        let enabled: Option<bool> = sqlx::query_scalar(
            "SELECT enabled
             FROM organisation_feature_flags
             WHERE organisation_id = $1 AND feature_code = $2",
        )
        .bind(organisation_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(enabled)
    }

    async fn flags_for(&self, organisation_id: &OrgId) -> Result<HashMap<String, bool>> {
        let rows = sqlx::query(
            "SELECT feature_code, enabled
             FROM organisation_feature_flags
             WHERE organisation_id = $1",
        )
        .bind(organisation_id)
        .fetch_all(&self.pool)
        .await?;

        let mut flags = HashMap::with_capacity(rows.len());
        for row in rows {
            let code: String = row.try_get("feature_code")?;
            let enabled: bool = row.try_get("enabled")?;
            flags.insert(code, enabled);
        }

        Ok(flags)
    }

    async fn types_for(&self, organisation_id: &OrgId) -> Result<Vec<OrganisationType>> {
        let rows = sqlx::query(
            "SELECT t.id, t.name
             FROM organisation_type_assignments a
             JOIN organisation_types t ON a.org_type_id = t.id
             WHERE a.organisation_id = $1
             ORDER BY t.name ASC",
        )
        .bind(organisation_id)
        .fetch_all(&self.pool)
        .await?;

        let types = rows
            .into_iter()
            .map(|row| {
                Ok((
                    OrgTypeId::from_string(row.try_get("id")?),
                    row.try_get::<String, _>("name")?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        self.load_patterns(types).await
    }

    async fn list_types(&self) -> Result<Vec<OrganisationType>> {
        let rows = sqlx::query(
            "SELECT id, name
             FROM organisation_types
             ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let types = rows
            .into_iter()
            .map(|row| {
                Ok((
                    OrgTypeId::from_string(row.try_get("id")?),
                    row.try_get::<String, _>("name")?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        self.load_patterns(types).await
    }

    async fn create_type(&self, org_type: &OrganisationType) -> Result<()> {
        let type_id = org_type.id.0.clone();
        let name = org_type.name.clone();
        let patterns: Vec<String> = org_type
            .default_feature_patterns
            .iter()
            .map(PermissionPattern::as_pattern_str)
            .collect();

        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                sqlx::query(
                    "INSERT INTO organisation_types (id, name)
                     VALUES ($1, $2)",
                )
                .bind(&type_id)
                .bind(&name)
                .execute(&mut **tx)
                .await?;

                for (position, pattern) in patterns.iter().enumerate() {
                    sqlx::query(
                        "INSERT INTO organisation_type_patterns (org_type_id, position, pattern)
                         VALUES ($1, $2, $3)",
                    )
                    .bind(&type_id)
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

    async fn assign_type(&self, organisation_id: &OrgId, org_type_id: &OrgTypeId) -> Result<()> {
        sqlx::query(
            "INSERT INTO organisation_type_assignments (organisation_id, org_type_id)
             VALUES ($1, $2)
             ON CONFLICT (organisation_id, org_type_id) DO NOTHING",
        )
        .bind(organisation_id)
        .bind(org_type_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn unassign_type(
        &self,
        organisation_id: &OrgId,
        org_type_id: &OrgTypeId,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM organisation_type_assignments
             WHERE organisation_id = $1 AND org_type_id = $2",
        )
        .bind(organisation_id)
        .bind(org_type_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn replace_flags(
        &self,
        organisation_id: &OrgId,
        flags: &HashMap<String, bool>,
    ) -> Result<()> {
        let org_id = organisation_id.0.clone();
        let mut entries: Vec<(String, bool)> =
            flags.iter().map(|(code, enabled)| (code.clone(), *enabled)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let now = chrono::Utc::now();

        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                sqlx::query(
                    "DELETE FROM organisation_feature_flags
                     WHERE organisation_id = $1",
                )
                .bind(&org_id)
                .execute(&mut **tx)
                .await?;

                for (code, enabled) in &entries {
                    sqlx::query(
                        "INSERT INTO organisation_feature_flags
                            (organisation_id, feature_code, enabled, updated_at)
                         VALUES ($1, $2, $3, $4)",
                    )
                    .bind(&org_id)
                    .bind(code)
                    .bind(enabled)
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
