//! Database repository for datasets (§3 `Dataset`).

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::datasets::{DatasetCreateDBRequest, DatasetDBResponse, DatasetUpdateDBRequest},
    },
    types::{DatasetId, DatasetStatus, DatasetType, UserId},
};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct DatasetFilter {
    pub owner: UserId,
    pub skip: i64,
    pub limit: i64,
}

pub struct Datasets<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Datasets<'c> {
    type CreateRequest = DatasetCreateDBRequest;
    type UpdateRequest = DatasetUpdateDBRequest;
    type Response = DatasetDBResponse;
    type Id = DatasetId;
    type Filter = DatasetFilter;

    #[instrument(skip(self, request), fields(owner = request.owner), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let row = sqlx::query_as!(
            DatasetDBResponse,
            r#"
            INSERT INTO datasets (owner, filename, dataset_type, status, row_count)
            VALUES ($1, $2, $3, 'pending', 0)
            RETURNING id, owner, filename, dataset_type as "dataset_type: DatasetType", status as "status: DatasetStatus", row_count, uploaded_at
            "#,
            request.owner,
            request.filename,
            request.dataset_type as DatasetType,
        )
        .fetch_one(&mut *self.db)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let row = sqlx::query_as!(
            DatasetDBResponse,
            r#"
            SELECT id, owner, filename, dataset_type as "dataset_type: DatasetType", status as "status: DatasetStatus", row_count, uploaded_at
            FROM datasets WHERE id = $1
            "#,
            id
        )
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<DatasetId>) -> Result<std::collections::HashMap<Self::Id, DatasetDBResponse>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }
        let rows = sqlx::query_as!(
            DatasetDBResponse,
            r#"
            SELECT id, owner, filename, dataset_type as "dataset_type: DatasetType", status as "status: DatasetStatus", row_count, uploaded_at
            FROM datasets WHERE id = ANY($1)
            "#,
            ids.as_slice()
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows.into_iter().map(|d| (d.id, d)).collect())
    }

    #[instrument(skip(self, filter), fields(owner = filter.owner), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let rows = sqlx::query_as!(
            DatasetDBResponse,
            r#"
            SELECT id, owner, filename, dataset_type as "dataset_type: DatasetType", status as "status: DatasetStatus", row_count, uploaded_at
            FROM datasets WHERE owner = $1 ORDER BY uploaded_at DESC LIMIT $2 OFFSET $3
            "#,
            filter.owner,
            filter.limit,
            filter.skip
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows)
    }

    /// Rows cascade-delete via the FK on `transaction_rows`/`click_rows` (§3).
    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query!("DELETE FROM datasets WHERE id = $1", id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let row = sqlx::query_as!(
            DatasetDBResponse,
            r#"
            UPDATE datasets SET
                status = COALESCE($2, status),
                row_count = COALESCE($3, row_count)
            WHERE id = $1
            RETURNING id, owner, filename, dataset_type as "dataset_type: DatasetType", status as "status: DatasetStatus", row_count, uploaded_at
            "#,
            id,
            request.status as Option<DatasetStatus>,
            request.row_count,
        )
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(row)
    }
}

impl<'c> Datasets<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}
