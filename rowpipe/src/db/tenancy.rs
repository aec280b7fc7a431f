//! The Tenancy Guard (§4.4): every row-bearing query must be scoped to the
//! calling user's `owner` column. Rather than trust every handler to add a
//! `WHERE owner = $n` clause, every tenant-scoped operation runs inside a
//! [`TenantSession`] — a transaction with `app.current_user_id` set via
//! `SET LOCAL`, backing row-level-security policies on `datasets`,
//! `transaction_rows`, `click_rows`, `ad_spends`, and `jobs` (see
//! `migrations/`) that compare `owner = current_setting('app.current_user_id')::bigint`.
//!
//! The transaction-scoping and guaranteed-release-on-panic idiom builds on
//! plain `sqlx::Transaction` usage throughout `db/handlers`, composed with
//! `scopeguard` for the panic-safety contract.

use sqlx::{PgPool, Postgres, Transaction};

use crate::db::errors::{DbError, Result};
use crate::types::UserId;

/// A transaction scoped to one tenant for the duration of a request. RLS
/// policies key off `app.current_user_id`, set with `SET LOCAL` so the
/// setting is automatically torn down on commit or rollback — no connection
/// can leak a stale tenant context back into the pool.
pub struct TenantSession<'a> {
    tx: Transaction<'a, Postgres>,
}

impl<'a> TenantSession<'a> {
    pub async fn begin(pool: &PgPool, user_id: UserId) -> Result<TenantSession<'static>> {
        let mut tx = pool.begin().await?;
        sqlx::query("SELECT set_config('app.current_user_id', $1, true)")
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?;
        Ok(TenantSession { tx })
    }

    pub fn connection(&mut self) -> &mut sqlx::PgConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(DbError::from)
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(DbError::from)
    }
}

/// Runs `f` inside a [`TenantSession`], committing on success and rolling
/// back on error. If `f` panics, `scopeguard` logs the abandonment before the
/// transaction is dropped — dropping a `sqlx::Transaction` without an
/// explicit commit already rolls it back at the connection level, so the
/// guard exists purely to surface the panic in logs, not to release anything
/// that wouldn't otherwise be released.
pub async fn with_tenant_session<T, F, Fut>(pool: &PgPool, user_id: UserId, f: F) -> Result<T>
where
    F: FnOnce(&mut TenantSession<'static>) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut session = TenantSession::begin(pool, user_id).await?;

    let guard = scopeguard::guard((), |_| {
        tracing::error!(user_id, "tenant session dropped without commit or rollback (panic in handler)");
    });

    let result = f(&mut session).await;
    scopeguard::ScopeGuard::into_inner(guard);

    match result {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(e) => {
            session.rollback().await?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn sets_current_user_id_for_rls(pool: PgPool) {
        let mut session = TenantSession::begin(&pool, 42).await.unwrap();
        let current: String = sqlx::query_scalar("SELECT current_setting('app.current_user_id')")
            .fetch_one(session.connection())
            .await
            .unwrap();
        assert_eq!(current, "42");
        session.commit().await.unwrap();
    }

    #[sqlx::test]
    async fn setting_does_not_leak_after_commit(pool: PgPool) {
        {
            let session = TenantSession::begin(&pool, 7).await.unwrap();
            session.commit().await.unwrap();
        }
        // A fresh connection from the pool has no SET LOCAL in effect.
        let mut conn = pool.acquire().await.unwrap();
        let result: std::result::Result<String, sqlx::Error> = sqlx::query_scalar("SELECT current_setting('app.current_user_id')")
            .fetch_one(&mut *conn)
            .await;
        assert!(result.is_err());
    }
}
