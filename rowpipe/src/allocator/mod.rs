//! The Ad-Spend Allocator (§4.6): distributes an `AdSpend` amount across the
//! transaction rows it funded, proportionally to revenue.
//!
//! Idempotency is enforced two ways: a `pg_advisory_xact_lock` keyed on
//! `(dataset_id, ad_spend_id)` serializes concurrent allocation attempts for
//! the same pair (a get-or-create advisory-lock idiom), and the
//! `ad_spend_allocations` table records completed runs so a retried request
//! after a crash is a no-op rather than a double-application.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::errors::Result,
    types::{AdSpendId, DatasetId, UserId},
};

#[derive(Debug, Clone, Copy)]
pub struct AllocationOutcome {
    pub rows_updated: i64,
    pub already_allocated: bool,
}

/// Locks an advisory key on `(dataset_id, ad_spend_id)`, checks the
/// allocation ledger, and — if this is the first run — distributes the ad
/// spend's `amount` across matching transaction rows.
///
/// Matching rule (§4.6): rows with `owner = owner`, `dataset_id = dataset_id`,
/// `date = ad_spend.date`, and `sub_id = ad_spend.sub_id` (NULL matches NULL).
/// Must run inside the caller's [`crate::db::tenancy::TenantSession`] so RLS
/// scopes both the read and the write to `owner`.
#[instrument(skip(db), fields(owner, %dataset_id, %ad_spend_id), err)]
pub async fn allocate(db: &mut PgConnection, owner: UserId, dataset_id: DatasetId, ad_spend_id: AdSpendId) -> Result<AllocationOutcome> {
    sqlx::query!("SELECT pg_advisory_xact_lock(hashtext($1)::bigint)", format!("{dataset_id}:{ad_spend_id}"))
        .execute(&mut *db)
        .await?;

    let already = sqlx::query_scalar!(
        "SELECT EXISTS(SELECT 1 FROM ad_spend_allocations WHERE ad_spend_id = $1 AND dataset_id = $2)",
        ad_spend_id,
        dataset_id,
    )
    .fetch_one(&mut *db)
    .await?
    .unwrap_or(false);

    if already {
        tracing::info!(%ad_spend_id, %dataset_id, "allocation already recorded, skipping");
        return Ok(AllocationOutcome {
            rows_updated: 0,
            already_allocated: true,
        });
    }

    let ad_spend = sqlx::query!("SELECT date, sub_id, amount FROM ad_spends WHERE id = $1 AND owner = $2", ad_spend_id, owner)
        .fetch_one(&mut *db)
        .await?;

    let rows = sqlx::query!(
        r#"
        SELECT id, revenue
        FROM transaction_rows
        WHERE owner = $1 AND dataset_id = $2 AND date = $3
          AND sub_id IS NOT DISTINCT FROM $4
        FOR UPDATE
        "#,
        owner,
        dataset_id,
        ad_spend.date,
        ad_spend.sub_id,
    )
    .fetch_all(&mut *db)
    .await?;

    if rows.is_empty() {
        tracing::info!(%ad_spend_id, %dataset_id, "no matching rows, ad spend recorded as unallocated");
        record_allocation(db, ad_spend_id, dataset_id).await?;
        return Ok(AllocationOutcome {
            rows_updated: 0,
            already_allocated: false,
        });
    }

    let shares = proportional_shares(ad_spend.amount, &rows.iter().map(|r| r.revenue).collect::<Vec<_>>());

    for (row, share) in rows.iter().zip(shares.iter()) {
        sqlx::query!(
            r#"
            UPDATE transaction_rows
            SET cost = cost + $2,
                profit = revenue - (cost + $2) - commission
            WHERE id = $1
            "#,
            row.id,
            share,
        )
        .execute(&mut *db)
        .await?;
    }

    record_allocation(db, ad_spend_id, dataset_id).await?;

    Ok(AllocationOutcome {
        rows_updated: rows.len() as i64,
        already_allocated: false,
    })
}

async fn record_allocation(db: &mut PgConnection, ad_spend_id: AdSpendId, dataset_id: DatasetId) -> Result<()> {
    sqlx::query!(
        "INSERT INTO ad_spend_allocations (ad_spend_id, dataset_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        ad_spend_id,
        dataset_id,
    )
    .execute(&mut *db)
    .await?;
    Ok(())
}

/// Splits `amount` across `revenues` proportionally; falls back to an equal
/// split if every revenue is zero (§4.6). The last share absorbs whatever
/// remainder 4-decimal-place rounding leaves so `shares.sum() == amount`
/// exactly.
fn proportional_shares(amount: Decimal, revenues: &[Decimal]) -> Vec<Decimal> {
    if revenues.is_empty() {
        return Vec::new();
    }

    let total_revenue: Decimal = revenues.iter().sum();
    let mut shares: Vec<Decimal> = if total_revenue.is_zero() {
        let equal = (amount / Decimal::from(revenues.len())).round_dp(4);
        vec![equal; revenues.len()]
    } else {
        revenues.iter().map(|r| (amount * r / total_revenue).round_dp(4)).collect()
    };

    let allocated: Decimal = shares.iter().sum();
    let remainder = amount - allocated;
    if let Some(last) = shares.last_mut() {
        *last += remainder;
    }
    shares
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proportional_split_sums_exactly_to_amount() {
        let amount = Decimal::new(10000, 2); // 100.00
        let revenues = vec![Decimal::from(300), Decimal::from(700)];
        let shares = proportional_shares(amount, &revenues);
        assert_eq!(shares.iter().sum::<Decimal>(), amount);
        assert_eq!(shares[0], Decimal::new(3000, 2));
        assert_eq!(shares[1], Decimal::new(7000, 2));
    }

    #[test]
    fn zero_revenue_rows_split_equally_and_sum_exactly() {
        let amount = Decimal::new(10, 2); // 0.10, deliberately not evenly divisible by 3
        let revenues = vec![Decimal::ZERO, Decimal::ZERO, Decimal::ZERO];
        let shares = proportional_shares(amount, &revenues);
        assert_eq!(shares.iter().sum::<Decimal>(), amount);
    }

    #[test]
    fn rounding_remainder_is_absorbed_by_last_share() {
        let amount = Decimal::new(100, 2); // 1.00 split three ways
        let revenues = vec![Decimal::from(1), Decimal::from(1), Decimal::from(1)];
        let shares = proportional_shares(amount, &revenues);
        assert_eq!(shares.iter().sum::<Decimal>(), amount);
        assert_eq!(shares[0], Decimal::new(3333, 4));
        assert_eq!(shares[1], Decimal::new(3333, 4));
    }
}
