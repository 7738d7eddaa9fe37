//! Transactional scope for the delete-then-insert replace operations.
//!
//! Every full-set replacement (organisation flags, role assignments,
//! permission overrides) must commit or roll back as a unit; a reader must
//! never observe the deleted-but-not-yet-reinserted state.

use futures::future::BoxFuture;
use sqlx::{PgPool, Postgres, Transaction};

use crate::Result;

/// Run `f` inside a transaction, committing on success and rolling back on
/// error.
pub async fn with_transaction<F, R>(pool: &PgPool, f: F) -> Result<R>
where
    F: for<'t> FnOnce(&'t mut Transaction<'static, Postgres>) -> BoxFuture<'t, Result<R>> + Send,
    R: Send,
{
    let mut tx = pool.begin().await?;

    match f(&mut tx).await {
        Ok(result) => {
            tx.commit().await?;
            Ok(result)
        }
        Err(e) => {
            tx.rollback().await?;
            Err(e)
        }
    }
}
