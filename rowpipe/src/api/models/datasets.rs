//! API-facing dataset and row models (§3 `Dataset`, `TransactionRow`, `ClickRow`, §6).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{click_rows::ClickRowDBResponse, datasets::DatasetDBResponse, transaction_rows::TransactionRowDBResponse},
    types::{ClickRowId, DatasetId, DatasetStatus, DatasetType, TransactionRowId},
};

#[derive(Debug, Serialize)]
pub struct DatasetResponse {
    pub id: DatasetId,
    pub filename: String,
    #[serde(rename = "type")]
    pub dataset_type: DatasetType,
    pub status: DatasetStatus,
    pub row_count: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl From<DatasetDBResponse> for DatasetResponse {
    fn from(d: DatasetDBResponse) -> Self {
        Self {
            id: d.id,
            filename: d.filename,
            dataset_type: d.dataset_type,
            status: d.status,
            row_count: d.row_count,
            uploaded_at: d.uploaded_at,
        }
    }
}

/// Decimals are serialized as strings to avoid float loss (§6).
fn decimal_as_string<S: serde::Serializer>(value: &Decimal, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&value.to_string())
}

#[derive(Debug, Serialize)]
pub struct TransactionRowResponse {
    pub id: TransactionRowId,
    pub dataset_id: DatasetId,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub platform: Option<String>,
    pub category: Option<String>,
    pub product: Option<String>,
    pub status: Option<String>,
    pub sub_id: Option<String>,
    pub order_id: Option<String>,
    pub product_id: Option<String>,
    #[serde(serialize_with = "decimal_as_string")]
    pub revenue: Decimal,
    #[serde(serialize_with = "decimal_as_string")]
    pub commission: Decimal,
    #[serde(serialize_with = "decimal_as_string")]
    pub cost: Decimal,
    #[serde(serialize_with = "decimal_as_string")]
    pub profit: Decimal,
    pub quantity: i64,
}

impl From<TransactionRowDBResponse> for TransactionRowResponse {
    fn from(r: TransactionRowDBResponse) -> Self {
        Self {
            id: r.id,
            dataset_id: r.dataset_id,
            date: r.date,
            time: r.time,
            platform: r.platform,
            category: r.category,
            product: r.product,
            status: r.status,
            sub_id: r.sub_id,
            order_id: r.order_id,
            product_id: r.product_id,
            revenue: r.revenue,
            commission: r.commission,
            cost: r.cost,
            profit: r.profit,
            quantity: r.quantity,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClickRowResponse {
    pub id: ClickRowId,
    pub dataset_id: DatasetId,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub channel: String,
    pub sub_id: Option<String>,
    pub clicks: i64,
}

impl From<ClickRowDBResponse> for ClickRowResponse {
    fn from(r: ClickRowDBResponse) -> Self {
        Self {
            id: r.id,
            dataset_id: r.dataset_id,
            date: r.date,
            time: r.time,
            channel: r.channel,
            sub_id: r.sub_id,
            clicks: r.clicks,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DatasetRowsResponse {
    Transaction(Vec<TransactionRowResponse>),
    Click(Vec<ClickRowResponse>),
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}
