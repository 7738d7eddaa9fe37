use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

use super::OverrideStore;
use crate::models::{OrgId, OverrideEntry, UserId};
use crate::transaction::with_transaction;
use crate::Result;

/// Permission override repository for database operations
#[derive(Clone)]
pub struct PgOverrideStore {
    pool: PgPool,
}

impl PgOverrideStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OverrideStore for PgOverrideStore {
    async fn overrides_for(
        &self,
        user_id: &UserId,
        organisation_id: &OrgId,
    ) -> Result<HashMap<String, bool>> {
        let rows = sqlx::query(
            "SELECT feature_code, granted
             FROM permission_overrides
             WHERE user_id = $1 AND organisation_id = $2",
        )
        .bind(user_id)
        .bind(organisation_id)
        .fetch_all(&self.pool)
        .await?;

        let mut overrides = HashMap::with_capacity(rows.len());
        for row in rows {
            let code: String = row.try_get("feature_code")?;
            let granted: bool = row.try_get("granted")?;
            overrides.insert(code, granted);
        }

        Ok(overrides)
    }

    async fn replace_overrides(
        &self,
        user_id: &UserId,
        organisation_id: &OrgId,
        entries: &[OverrideEntry],
    ) -> Result<()> {
        let user_id = user_id.0.clone();
        let org_id = organisation_id.0.clone();
        // Inherit entries mean "no row" and are dropped here; a later
        // duplicate code wins, matching one-row-per-triple semantics.
        let mut persisted: HashMap<String, bool> = HashMap::new();
        for entry in entries {
            match entry.state.as_flag() {
                Some(granted) => {
                    persisted.insert(entry.feature_code.clone(), granted);
                }
                None => {
                    persisted.remove(&entry.feature_code);
                }
            }
        }
        let mut rows: Vec<(String, bool)> = persisted.into_iter().collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        let now = chrono::Utc::now();

        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                sqlx::query(
                    "DELETE FROM permission_overrides
                     WHERE user_id = $1 AND organisation_id = $2",
                )
                .bind(&user_id)
                .bind(&org_id)
                .execute(&mut **tx)
                .await?;

                for (code, granted) in &rows {
                    sqlx::query(
                        "INSERT INTO permission_overrides
                            (user_id, organisation_id, feature_code, granted, updated_at)
                         VALUES ($1, $2, $3, $4, $5)",
                    )
                    .bind(&user_id)
                    .bind(&org_id)
                    .bind(code)
                    .bind(granted)
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
