//! Database queries for the Query Engine (§4.5): filtered KPI, period, and
//! product aggregations over a tenant's transaction rows.
//!
//! All three aggregations are issued against the same filter and, per the
//! consistency contract in §4.5, run inside one read transaction so they
//! observe a single snapshot of the data — a concurrent ingest job's batch
//! either appears in all three or none.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

use crate::{db::errors::Result, types::UserId};

/// Conjunctive filter set for a dashboard query (§4.5). Empty (`None`)
/// fields impose no constraint; an empty filter set means "all of the
/// owner's rows across all datasets".
#[derive(Debug, Clone)]
pub struct DashboardFilter {
    pub owner: UserId,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    /// Case-insensitive substring match against `product`.
    pub product: Option<String>,
    pub min_revenue: Option<Decimal>,
    pub max_revenue: Option<Decimal>,
    pub platform: Option<String>,
    pub category: Option<String>,
    pub sub_id: Option<String>,
    /// How many top products to return before folding the tail into "other".
    pub top_k: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct KpiRow {
    pub revenue: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub commission: Option<Decimal>,
    pub profit: Option<Decimal>,
    pub row_count: Option<i64>,
    pub distinct_order_count: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PeriodRow {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub commission: Decimal,
    pub profit: Decimal,
    pub row_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProductRow {
    pub product: String,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub commission: Decimal,
    pub profit: Decimal,
    pub row_count: i64,
}

/// Runs the KPI, period, and product aggregations against the same
/// connection (the caller is expected to have it inside a single
/// transaction opened via [`crate::db::tenancy::with_tenant_session`]).
#[instrument(skip(db, filter), fields(owner = filter.owner), err)]
pub async fn kpis(db: &mut PgConnection, filter: &DashboardFilter) -> Result<KpiRow> {
    let row = sqlx::query_as!(
        KpiRow,
        r#"
        SELECT
            SUM(revenue) as revenue,
            SUM(cost) as cost,
            SUM(commission) as commission,
            SUM(profit) as profit,
            COUNT(*) as row_count,
            COUNT(DISTINCT order_id) as distinct_order_count
        FROM transaction_rows
        WHERE owner = $1
          AND ($2::date IS NULL OR date >= $2)
          AND ($3::date IS NULL OR date <= $3)
          AND ($4::text IS NULL OR product ILIKE '%' || $4 || '%')
          AND ($5::numeric IS NULL OR revenue >= $5)
          AND ($6::numeric IS NULL OR revenue <= $6)
          AND ($7::text IS NULL OR platform = $7)
          AND ($8::text IS NULL OR category = $8)
          AND ($9::text IS NULL OR sub_id = $9)
        "#,
        filter.owner,
        filter.date_start,
        filter.date_end,
        filter.product,
        filter.min_revenue,
        filter.max_revenue,
        filter.platform,
        filter.category,
        filter.sub_id,
    )
    .fetch_one(&mut *db)
    .await?;
    Ok(row)
}

/// Per-day totals within the filter range, ascending date order; days with
/// zero matching rows are omitted automatically since they contribute no
/// group (§4.5).
#[instrument(skip(db, filter), fields(owner = filter.owner), err)]
pub async fn period_aggregation(db: &mut PgConnection, filter: &DashboardFilter) -> Result<Vec<PeriodRow>> {
    let rows = sqlx::query_as!(
        PeriodRow,
        r#"
        SELECT
            date as "date!",
            SUM(revenue) as "revenue!",
            SUM(cost) as "cost!",
            SUM(commission) as "commission!",
            SUM(profit) as "profit!",
            COUNT(*) as "row_count!"
        FROM transaction_rows
        WHERE owner = $1
          AND ($2::date IS NULL OR date >= $2)
          AND ($3::date IS NULL OR date <= $3)
          AND ($4::text IS NULL OR product ILIKE '%' || $4 || '%')
          AND ($5::numeric IS NULL OR revenue >= $5)
          AND ($6::numeric IS NULL OR revenue <= $6)
          AND ($7::text IS NULL OR platform = $7)
          AND ($8::text IS NULL OR category = $8)
          AND ($9::text IS NULL OR sub_id = $9)
        GROUP BY date
        ORDER BY date ASC
        "#,
        filter.owner,
        filter.date_start,
        filter.date_end,
        filter.product,
        filter.min_revenue,
        filter.max_revenue,
        filter.platform,
        filter.category,
        filter.sub_id,
    )
    .fetch_all(&mut *db)
    .await?;
    Ok(rows)
}

/// Per-product totals, descending by revenue, ties broken by product name
/// ascending. Returns every matching product; the caller (§4.5) caps this at
/// `top_k` and folds the tail into an "other" bucket — that fold is pure
/// arithmetic over an already-consistent snapshot, so it happens outside the
/// transaction in [`crate::api::handlers::dashboard`].
#[instrument(skip(db, filter), fields(owner = filter.owner), err)]
pub async fn product_aggregation(db: &mut PgConnection, filter: &DashboardFilter) -> Result<Vec<ProductRow>> {
    let rows = sqlx::query_as!(
        ProductRow,
        r#"
        SELECT
            product as "product!",
            SUM(revenue) as "revenue!",
            SUM(cost) as "cost!",
            SUM(commission) as "commission!",
            SUM(profit) as "profit!",
            COUNT(*) as "row_count!"
        FROM transaction_rows
        WHERE owner = $1
          AND ($2::date IS NULL OR date >= $2)
          AND ($3::date IS NULL OR date <= $3)
          AND ($4::text IS NULL OR product ILIKE '%' || $4 || '%')
          AND ($5::numeric IS NULL OR revenue >= $5)
          AND ($6::numeric IS NULL OR revenue <= $6)
          AND ($7::text IS NULL OR platform = $7)
          AND ($8::text IS NULL OR category = $8)
          AND ($9::text IS NULL OR sub_id = $9)
        GROUP BY product
        ORDER BY revenue DESC, product ASC
        "#,
        filter.owner,
        filter.date_start,
        filter.date_end,
        filter.product,
        filter.min_revenue,
        filter.max_revenue,
        filter.platform,
        filter.category,
        filter.sub_id,
    )
    .fetch_all(&mut *db)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{handlers::{Repository, TransactionRows}, models::transaction_rows::TransactionRowInsert};
    use sqlx::PgPool;

    fn filter(owner: UserId) -> DashboardFilter {
        DashboardFilter {
            owner,
            date_start: None,
            date_end: None,
            product: None,
            min_revenue: None,
            max_revenue: None,
            platform: None,
            category: None,
            sub_id: None,
            top_k: 10,
        }
    }

    fn row(owner: UserId, dataset_id: i64, date: &str, product: &str, revenue: i64) -> TransactionRowInsert {
        TransactionRowInsert {
            dataset_id,
            owner,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            time: None,
            platform: None,
            category: None,
            product: Some(product.to_string()),
            status: None,
            sub_id: None,
            order_id: None,
            product_id: None,
            revenue: Decimal::from(revenue),
            commission: Decimal::ZERO,
            cost: Decimal::ZERO,
            profit: Decimal::from(revenue),
            quantity: 1,
            fingerprint: format!("{date}{product}{revenue}"),
        }
    }

    #[sqlx::test]
    async fn kpis_sum_across_products(pool: PgPool) {
        sqlx::query!("INSERT INTO users (id, email, password_hash, active) VALUES (1, 'a@b.com', 'h', true)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query!("INSERT INTO datasets (id, owner, filename, dataset_type, status, row_count) VALUES (1, 1, 'f.csv', 'transaction', 'completed', 2)")
            .execute(&pool)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = TransactionRows::new(&mut conn);
        repo.create(&row(1, 1, "2024-01-01", "P1", 100)).await.unwrap();
        repo.create(&row(1, 1, "2024-01-01", "P2", 200)).await.unwrap();

        let kpi = kpis(&mut conn, &filter(1)).await.unwrap();
        assert_eq!(kpi.revenue, Some(Decimal::from(300)));
        assert_eq!(kpi.row_count, Some(2));
    }

    #[sqlx::test]
    async fn product_aggregation_orders_by_revenue_desc(pool: PgPool) {
        sqlx::query!("INSERT INTO users (id, email, password_hash, active) VALUES (1, 'a@b.com', 'h', true)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query!("INSERT INTO datasets (id, owner, filename, dataset_type, status, row_count) VALUES (1, 1, 'f.csv', 'transaction', 'completed', 2)")
            .execute(&pool)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = TransactionRows::new(&mut conn);
        repo.create(&row(1, 1, "2024-01-01", "P1", 100)).await.unwrap();
        repo.create(&row(1, 1, "2024-01-01", "P2", 200)).await.unwrap();

        let products = product_aggregation(&mut conn, &filter(1)).await.unwrap();
        assert_eq!(products[0].product, "P2");
        assert_eq!(products[1].product, "P1");
    }

    #[sqlx::test]
    async fn date_range_outside_data_yields_empty(pool: PgPool) {
        sqlx::query!("INSERT INTO users (id, email, password_hash, active) VALUES (1, 'a@b.com', 'h', true)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query!("INSERT INTO datasets (id, owner, filename, dataset_type, status, row_count) VALUES (1, 1, 'f.csv', 'transaction', 'completed', 1)")
            .execute(&pool)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = TransactionRows::new(&mut conn);
        repo.create(&row(1, 1, "2024-01-01", "P1", 100)).await.unwrap();

        let mut f = filter(1);
        f.date_start = Some(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        f.date_end = Some(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());

        let kpi = kpis(&mut conn, &f).await.unwrap();
        assert_eq!(kpi.row_count, Some(0));
        assert!(period_aggregation(&mut conn, &f).await.unwrap().is_empty());
    }
}
