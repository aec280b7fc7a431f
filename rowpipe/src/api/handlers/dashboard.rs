//! `GET /dashboard` (§4.5, §6): KPIs and aggregations over the caller's
//! transaction rows, run as one consistent read.

use axum::extract::{Query, State};
use axum::Json;
use rust_decimal::Decimal;

use crate::{
    AppState,
    api::models::{
        dashboard::{DashboardQuery, DashboardResponse, KpiResponse, PeriodPoint, ProductPoint},
        users::CurrentUser,
    },
    db::{handlers::analytics::{self, DashboardFilter}, tenancy::with_tenant_session},
    errors::Result,
};

pub async fn get_dashboard(State(state): State<AppState>, user: CurrentUser, Query(query): Query<DashboardQuery>) -> Result<Json<DashboardResponse>> {
    let cache_key = query.cache_key(user.id);
    if let Some(cached) = state.dashboard_cache.get(&cache_key).await {
        return Ok(Json(cached));
    }

    let filter = DashboardFilter {
        owner: user.id,
        date_start: query.start,
        date_end: query.end,
        product: query.product,
        min_revenue: query.min_revenue,
        max_revenue: query.max_revenue,
        platform: query.platform,
        category: query.category,
        sub_id: query.sub_id,
        top_k: query.top_k.max(0),
    };

    // All three aggregations run inside one transaction so they see the same
    // snapshot (§4.5) — a concurrent ingest job's batch either appears in
    // all three or none.
    let (kpi, period, products) = with_tenant_session(&state.db, user.id, |session| {
        let filter = filter.clone();
        async move {
            let conn = session.connection();
            let kpi = analytics::kpis(conn, &filter).await?;
            let period = analytics::period_aggregation(conn, &filter).await?;
            let products = analytics::product_aggregation(conn, &filter).await?;
            Ok((kpi, period, products))
        }
    })
    .await?;

    let kpis = KpiResponse {
        revenue: kpi.revenue.unwrap_or(Decimal::ZERO),
        cost: kpi.cost.unwrap_or(Decimal::ZERO),
        commission: kpi.commission.unwrap_or(Decimal::ZERO),
        profit: kpi.profit.unwrap_or(Decimal::ZERO),
        rows: kpi.row_count.unwrap_or(0),
        distinct_orders: kpi.distinct_order_count.unwrap_or(0),
    };

    let period = period
        .into_iter()
        .map(|p| PeriodPoint {
            date: p.date,
            revenue: p.revenue,
            cost: p.cost,
            commission: p.commission,
            profit: p.profit,
            rows: p.row_count,
        })
        .collect();

    let top_k = filter.top_k.max(0) as usize;
    let mut product_points: Vec<ProductPoint> = products
        .iter()
        .take(top_k)
        .map(|p| ProductPoint {
            product: p.product.clone(),
            revenue: p.revenue,
            cost: p.cost,
            commission: p.commission,
            profit: p.profit,
            rows: p.row_count,
            is_other: false,
        })
        .collect();

    if products.len() > top_k {
        let tail = &products[top_k..];
        let other = ProductPoint {
            product: "other".to_string(),
            revenue: tail.iter().map(|p| p.revenue).sum(),
            cost: tail.iter().map(|p| p.cost).sum(),
            commission: tail.iter().map(|p| p.commission).sum(),
            profit: tail.iter().map(|p| p.profit).sum(),
            rows: tail.iter().map(|p| p.row_count).sum(),
            is_other: true,
        };
        product_points.push(other);
    }

    let response = DashboardResponse {
        kpis,
        period,
        products: product_points,
    };

    state.dashboard_cache.insert(cache_key, response.clone()).await;

    Ok(Json(response))
}
