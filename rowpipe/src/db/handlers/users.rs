//! Database repository for users (§3 `User`).

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
    types::UserId,
};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as!(
            UserDBResponse,
            r#"
            INSERT INTO users (email, password_hash, active)
            VALUES ($1, $2, true)
            RETURNING id, email, password_hash, active, created_at, updated_at
            "#,
            request.email,
            request.password_hash,
        )
        .fetch_one(&mut *self.db)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as!(
            UserDBResponse,
            "SELECT id, email, password_hash, active, created_at, updated_at FROM users WHERE id = $1",
            id
        )
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<UserId>) -> Result<std::collections::HashMap<Self::Id, UserDBResponse>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }
        let rows = sqlx::query_as!(
            UserDBResponse,
            "SELECT id, email, password_hash, active, created_at, updated_at FROM users WHERE id = ANY($1)",
            ids.as_slice()
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows.into_iter().map(|u| (u.id, u)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as!(
            UserDBResponse,
            "SELECT id, email, password_hash, active, created_at, updated_at FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            filter.limit,
            filter.skip
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(users)
    }

    /// Deactivates a user (§3: "soft-deactivated, never hard-deleted"). The
    /// `bool` return communicates whether a row existed to deactivate.
    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query!("UPDATE users SET active = false, updated_at = NOW() WHERE id = $1 AND active = true", id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as!(
            UserDBResponse,
            r#"
            UPDATE users SET
                password_hash = COALESCE($2, password_hash),
                active = COALESCE($3, active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, password_hash, active, created_at, updated_at
            "#,
            id,
            request.password_hash,
            request.active,
        )
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(user)
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as!(
            UserDBResponse,
            "SELECT id, email, password_hash, active, created_at, updated_at FROM users WHERE email = $1",
            email
        )
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn create_and_fetch_by_email(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let created = repo
            .create(&UserCreateDBRequest {
                email: "a@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        assert!(created.active);

        let found = repo.get_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
    }

    #[sqlx::test]
    async fn deactivate_is_idempotent_false_on_second_call(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let created = repo
            .create(&UserCreateDBRequest {
                email: "b@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
    }
}
