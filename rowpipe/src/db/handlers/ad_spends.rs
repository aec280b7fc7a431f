//! Database repository for ad spend records (§3 `AdSpend`), the input to
//! the Ad-Spend Allocator (§4.6).

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::ad_spends::{AdSpendCreateDBRequest, AdSpendDBResponse, AdSpendUpdateDBRequest},
    },
    types::{AdSpendId, UserId},
};
use chrono::NaiveDate;
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct AdSpendFilter {
    pub owner: UserId,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub skip: i64,
    pub limit: i64,
}

pub struct AdSpends<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for AdSpends<'c> {
    type CreateRequest = AdSpendCreateDBRequest;
    type UpdateRequest = AdSpendUpdateDBRequest;
    type Response = AdSpendDBResponse;
    type Id = AdSpendId;
    type Filter = AdSpendFilter;

    #[instrument(skip(self, request), fields(owner = request.owner), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let row = sqlx::query_as!(
            AdSpendDBResponse,
            r#"
            INSERT INTO ad_spends (owner, date, sub_id, amount, clicks)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, owner, date, sub_id, amount, clicks
            "#,
            request.owner,
            request.date,
            request.sub_id,
            request.amount,
            request.clicks,
        )
        .fetch_one(&mut *self.db)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let row = sqlx::query_as!(
            AdSpendDBResponse,
            "SELECT id, owner, date, sub_id, amount, clicks FROM ad_spends WHERE id = $1",
            id
        )
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<AdSpendId>) -> Result<std::collections::HashMap<Self::Id, AdSpendDBResponse>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }
        let rows = sqlx::query_as!(
            AdSpendDBResponse,
            "SELECT id, owner, date, sub_id, amount, clicks FROM ad_spends WHERE id = ANY($1)",
            ids.as_slice()
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows.into_iter().map(|r| (r.id, r)).collect())
    }

    #[instrument(skip(self, filter), fields(owner = filter.owner), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let rows = sqlx::query_as!(
            AdSpendDBResponse,
            r#"
            SELECT id, owner, date, sub_id, amount, clicks
            FROM ad_spends
            WHERE owner = $1
              AND ($2::date IS NULL OR date >= $2)
              AND ($3::date IS NULL OR date <= $3)
            ORDER BY date DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
            filter.owner,
            filter.from,
            filter.to,
            filter.limit,
            filter.skip
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query!("DELETE FROM ad_spends WHERE id = $1", id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let row = sqlx::query_as!(
            AdSpendDBResponse,
            r#"
            UPDATE ad_spends SET
                amount = COALESCE($2, amount),
                clicks = COALESCE($3, clicks)
            WHERE id = $1
            RETURNING id, owner, date, sub_id, amount, clicks
            "#,
            id,
            request.amount,
            request.clicks,
        )
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(row)
    }
}

impl<'c> AdSpends<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}
