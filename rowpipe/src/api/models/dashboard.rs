//! API-facing dashboard models (§4.5 Query Engine).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

fn default_top_k() -> i64 {
    10
}

/// Query-string filters for `GET /dashboard` (§6). All fields optional;
/// an empty query string means "all of the owner's rows across all datasets"
/// (§4.5).
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub product: Option<String>,
    pub min_revenue: Option<Decimal>,
    pub max_revenue: Option<Decimal>,
    pub platform: Option<String>,
    pub category: Option<String>,
    pub sub_id: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
}

impl DashboardQuery {
    /// Deterministic key for the dashboard aggregation cache (§4.5): two
    /// requests with the same owner and the same filter values must collide,
    /// regardless of query-param ordering.
    pub fn cache_key(&self, owner: crate::UserId) -> String {
        format!(
            "{owner}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{}",
            self.start, self.end, self.product, self.min_revenue, self.max_revenue, self.platform, self.category, self.sub_id, self.top_k
        )
    }
}

fn decimal_as_string<S: serde::Serializer>(value: &Decimal, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&value.round_dp(2).to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct KpiResponse {
    #[serde(serialize_with = "decimal_as_string")]
    pub revenue: Decimal,
    #[serde(serialize_with = "decimal_as_string")]
    pub cost: Decimal,
    #[serde(serialize_with = "decimal_as_string")]
    pub commission: Decimal,
    #[serde(serialize_with = "decimal_as_string")]
    pub profit: Decimal,
    pub rows: i64,
    pub distinct_orders: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodPoint {
    pub date: NaiveDate,
    #[serde(serialize_with = "decimal_as_string")]
    pub revenue: Decimal,
    #[serde(serialize_with = "decimal_as_string")]
    pub cost: Decimal,
    #[serde(serialize_with = "decimal_as_string")]
    pub commission: Decimal,
    #[serde(serialize_with = "decimal_as_string")]
    pub profit: Decimal,
    pub rows: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductPoint {
    pub product: String,
    #[serde(serialize_with = "decimal_as_string")]
    pub revenue: Decimal,
    #[serde(serialize_with = "decimal_as_string")]
    pub cost: Decimal,
    #[serde(serialize_with = "decimal_as_string")]
    pub commission: Decimal,
    #[serde(serialize_with = "decimal_as_string")]
    pub profit: Decimal,
    pub rows: i64,
    /// `true` for the synthetic residual bucket summing the tail past `top_k`.
    #[serde(default)]
    pub is_other: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardResponse {
    pub kpis: KpiResponse,
    pub period: Vec<PeriodPoint>,
    pub products: Vec<ProductPoint>,
}
