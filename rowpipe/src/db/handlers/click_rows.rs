//! Database repository for click rows (§3 `ClickRow`).

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::click_rows::{ClickRowDBResponse, ClickRowInsert},
    },
    types::{ClickRowId, DatasetId, UserId},
};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct ClickRowFilter {
    pub owner: UserId,
    pub dataset_id: Option<DatasetId>,
    pub skip: i64,
    pub limit: i64,
}

pub struct ClickRows<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for ClickRows<'c> {
    type CreateRequest = ClickRowInsert;
    type UpdateRequest = ();
    type Response = ClickRowDBResponse;
    type Id = ClickRowId;
    type Filter = ClickRowFilter;

    #[instrument(skip(self, request), fields(dataset_id = request.dataset_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let row = sqlx::query_as!(
            ClickRowDBResponse,
            r#"
            INSERT INTO click_rows (dataset_id, owner, date, time, channel, sub_id, clicks, fingerprint)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (owner, fingerprint) DO NOTHING
            RETURNING id, dataset_id, owner, date, time, channel, sub_id, clicks
            "#,
            request.dataset_id,
            request.owner,
            request.date,
            request.time,
            request.channel,
            request.sub_id,
            request.clicks,
            request.fingerprint,
        )
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or_else(|| DbError::UniqueViolation {
            constraint: Some("click_rows_owner_fingerprint_key".to_string()),
            table: Some("click_rows".to_string()),
            message: "duplicate row fingerprint for this owner".to_string(),
        })?;
        Ok(row)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let row = sqlx::query_as!(
            ClickRowDBResponse,
            "SELECT id, dataset_id, owner, date, time, channel, sub_id, clicks FROM click_rows WHERE id = $1",
            id
        )
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<ClickRowId>) -> Result<std::collections::HashMap<Self::Id, ClickRowDBResponse>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }
        let rows = sqlx::query_as!(
            ClickRowDBResponse,
            "SELECT id, dataset_id, owner, date, time, channel, sub_id, clicks FROM click_rows WHERE id = ANY($1)",
            ids.as_slice()
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows.into_iter().map(|r| (r.id, r)).collect())
    }

    #[instrument(skip(self, filter), fields(owner = filter.owner), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let rows = sqlx::query_as!(
            ClickRowDBResponse,
            r#"
            SELECT id, dataset_id, owner, date, time, channel, sub_id, clicks
            FROM click_rows
            WHERE owner = $1 AND ($2::bigint IS NULL OR dataset_id = $2)
            ORDER BY date DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
            filter.owner,
            filter.dataset_id,
            filter.limit,
            filter.skip
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query!("DELETE FROM click_rows WHERE id = $1", id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update(&mut self, _id: Self::Id, _request: &Self::UpdateRequest) -> Result<Self::Response> {
        unimplemented!("click rows are immutable after ingestion")
    }
}

impl<'c> ClickRows<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Bulk-inserts a chunk's worth of normalized rows, skipping any whose
    /// `(owner, fingerprint)` pair already exists (§4.1 dedup).
    #[instrument(skip(self, rows), fields(count = rows.len()), err)]
    pub async fn insert_batch(&mut self, rows: &[ClickRowInsert]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let dataset_ids: Vec<DatasetId> = rows.iter().map(|r| r.dataset_id).collect();
        let owners: Vec<UserId> = rows.iter().map(|r| r.owner).collect();
        let dates: Vec<chrono::NaiveDate> = rows.iter().map(|r| r.date).collect();
        let times: Vec<Option<chrono::NaiveTime>> = rows.iter().map(|r| r.time).collect();
        let channels: Vec<String> = rows.iter().map(|r| r.channel.clone()).collect();
        let sub_ids: Vec<Option<String>> = rows.iter().map(|r| r.sub_id.clone()).collect();
        let clicks: Vec<i64> = rows.iter().map(|r| r.clicks).collect();
        let fingerprints: Vec<String> = rows.iter().map(|r| r.fingerprint.clone()).collect();

        let result = sqlx::query!(
            r#"
            INSERT INTO click_rows (dataset_id, owner, date, time, channel, sub_id, clicks, fingerprint)
            SELECT * FROM UNNEST(
                $1::bigint[], $2::bigint[], $3::date[], $4::time[], $5::text[], $6::text[], $7::bigint[], $8::text[]
            )
            ON CONFLICT (owner, fingerprint) DO NOTHING
            "#,
            &dataset_ids,
            &owners,
            &dates,
            &times as &[Option<chrono::NaiveTime>],
            &channels,
            &sub_ids as &[Option<String>],
            &clicks,
            &fingerprints,
        )
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }
}
