//! Database repository for transaction rows (§3 `TransactionRow`).
//!
//! Ingestion inserts rows by the thousand per chunk, so alongside the
//! [`Repository`] trait's single-row `create` this exposes [`TransactionRows::insert_batch`],
//! which unnests column arrays into one `INSERT` statement.

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::transaction_rows::{TransactionRowDBResponse, TransactionRowInsert},
    },
    types::{DatasetId, TransactionRowId, UserId},
};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct TransactionRowFilter {
    pub owner: UserId,
    pub dataset_id: Option<DatasetId>,
    pub skip: i64,
    pub limit: i64,
}

pub struct TransactionRows<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for TransactionRows<'c> {
    type CreateRequest = TransactionRowInsert;
    type UpdateRequest = ();
    type Response = TransactionRowDBResponse;
    type Id = TransactionRowId;
    type Filter = TransactionRowFilter;

    #[instrument(skip(self, request), fields(dataset_id = request.dataset_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let row = sqlx::query_as!(
            TransactionRowDBResponse,
            r#"
            INSERT INTO transaction_rows
                (dataset_id, owner, date, time, platform, category, product, status,
                 sub_id, order_id, product_id, revenue, commission, cost, profit, quantity, fingerprint)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (owner, fingerprint) DO NOTHING
            RETURNING id, dataset_id, owner, date, time, platform, category, product, status,
                      sub_id, order_id, product_id, revenue, commission, cost, profit, quantity
            "#,
            request.dataset_id,
            request.owner,
            request.date,
            request.time,
            request.platform,
            request.category,
            request.product,
            request.status,
            request.sub_id,
            request.order_id,
            request.product_id,
            request.revenue,
            request.commission,
            request.cost,
            request.profit,
            request.quantity,
            request.fingerprint,
        )
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or_else(|| DbError::UniqueViolation {
            constraint: Some("transaction_rows_owner_fingerprint_key".to_string()),
            table: Some("transaction_rows".to_string()),
            message: "duplicate row fingerprint for this owner".to_string(),
        })?;
        Ok(row)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let row = sqlx::query_as!(
            TransactionRowDBResponse,
            r#"
            SELECT id, dataset_id, owner, date, time, platform, category, product, status,
                   sub_id, order_id, product_id, revenue, commission, cost, profit, quantity
            FROM transaction_rows WHERE id = $1
            "#,
            id
        )
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<TransactionRowId>) -> Result<std::collections::HashMap<Self::Id, TransactionRowDBResponse>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }
        let rows = sqlx::query_as!(
            TransactionRowDBResponse,
            r#"
            SELECT id, dataset_id, owner, date, time, platform, category, product, status,
                   sub_id, order_id, product_id, revenue, commission, cost, profit, quantity
            FROM transaction_rows WHERE id = ANY($1)
            "#,
            ids.as_slice()
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows.into_iter().map(|r| (r.id, r)).collect())
    }

    #[instrument(skip(self, filter), fields(owner = filter.owner), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let rows = sqlx::query_as!(
            TransactionRowDBResponse,
            r#"
            SELECT id, dataset_id, owner, date, time, platform, category, product, status,
                   sub_id, order_id, product_id, revenue, commission, cost, profit, quantity
            FROM transaction_rows
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
        let result = sqlx::query!("DELETE FROM transaction_rows WHERE id = $1", id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transaction rows are append-only once ingested (§4.1); there is no
    /// field to patch after the fact.
    async fn update(&mut self, _id: Self::Id, _request: &Self::UpdateRequest) -> Result<Self::Response> {
        unimplemented!("transaction rows are immutable after ingestion")
    }
}

impl<'c> TransactionRows<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Bulk-inserts a chunk's worth of normalized rows, skipping any whose
    /// `(owner, fingerprint)` pair already exists (§4.1 dedup). Returns the
    /// number of rows actually inserted, which may be less than `rows.len()`.
    #[instrument(skip(self, rows), fields(count = rows.len()), err)]
    pub async fn insert_batch(&mut self, rows: &[TransactionRowInsert]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let dataset_ids: Vec<DatasetId> = rows.iter().map(|r| r.dataset_id).collect();
        let owners: Vec<UserId> = rows.iter().map(|r| r.owner).collect();
        let dates: Vec<chrono::NaiveDate> = rows.iter().map(|r| r.date).collect();
        let times: Vec<Option<chrono::NaiveTime>> = rows.iter().map(|r| r.time).collect();
        let platforms: Vec<Option<String>> = rows.iter().map(|r| r.platform.clone()).collect();
        let categories: Vec<Option<String>> = rows.iter().map(|r| r.category.clone()).collect();
        let products: Vec<Option<String>> = rows.iter().map(|r| r.product.clone()).collect();
        let statuses: Vec<Option<String>> = rows.iter().map(|r| r.status.clone()).collect();
        let sub_ids: Vec<Option<String>> = rows.iter().map(|r| r.sub_id.clone()).collect();
        let order_ids: Vec<Option<String>> = rows.iter().map(|r| r.order_id.clone()).collect();
        let product_ids: Vec<Option<String>> = rows.iter().map(|r| r.product_id.clone()).collect();
        let revenues: Vec<Decimal> = rows.iter().map(|r| r.revenue).collect();
        let commissions: Vec<Decimal> = rows.iter().map(|r| r.commission).collect();
        let costs: Vec<Decimal> = rows.iter().map(|r| r.cost).collect();
        let profits: Vec<Decimal> = rows.iter().map(|r| r.profit).collect();
        let quantities: Vec<i64> = rows.iter().map(|r| r.quantity).collect();
        let fingerprints: Vec<String> = rows.iter().map(|r| r.fingerprint.clone()).collect();

        let result = sqlx::query!(
            r#"
            INSERT INTO transaction_rows
                (dataset_id, owner, date, time, platform, category, product, status,
                 sub_id, order_id, product_id, revenue, commission, cost, profit, quantity, fingerprint)
            SELECT * FROM UNNEST(
                $1::bigint[], $2::bigint[], $3::date[], $4::time[], $5::text[], $6::text[], $7::text[], $8::text[],
                $9::text[], $10::text[], $11::text[], $12::numeric[], $13::numeric[], $14::numeric[], $15::numeric[],
                $16::bigint[], $17::text[]
            )
            ON CONFLICT (owner, fingerprint) DO NOTHING
            "#,
            &dataset_ids,
            &owners,
            &dates,
            &times as &[Option<chrono::NaiveTime>],
            &platforms as &[Option<String>],
            &categories as &[Option<String>],
            &products as &[Option<String>],
            &statuses as &[Option<String>],
            &sub_ids as &[Option<String>],
            &order_ids as &[Option<String>],
            &product_ids as &[Option<String>],
            &revenues,
            &commissions,
            &costs,
            &profits,
            &quantities,
            &fingerprints,
        )
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }
}
