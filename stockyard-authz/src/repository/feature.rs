use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use super::FeatureStore;
use crate::models::Feature;
use crate::Result;

/// Feature catalog repository for database operations
#[derive(Clone)]
pub struct PgFeatureStore {
    pool: PgPool,
}

impl PgFeatureStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert catalog features that are not yet present. Codes already in the
    /// table are left untouched; codes are never renamed in place.
    pub async fn seed(&self, features: &[Feature]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for feature in features {
            sqlx::query(
                "INSERT INTO features (code, name, description, category)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (code) DO NOTHING",
            )
            .bind(&feature.code)
            .bind(&feature.name)
            .bind(&feature.description)
            .bind(&feature.category)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    fn row_to_feature(row: &PgRow) -> Result<Feature> {
        Ok(Feature {
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            category: row.try_get("category")?,
        })
    }
}

#[async_trait]
impl FeatureStore for PgFeatureStore {
    async fn list_all(&self) -> Result<Vec<Feature>> {
        let rows = sqlx::query(
            "SELECT code, name, description, category
             FROM features
             ORDER BY code ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_feature).collect()
    }

    async fn exists(&self, code: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) as count
             FROM features
             WHERE code = $1",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {

    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_seed_and_list() {
        // Integration test placeholder
    }
}
