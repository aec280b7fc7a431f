//! Database models for transaction rows (§3 `TransactionRow`).

use crate::types::{DatasetId, TransactionRowId, UserId};
use chrono::NaiveDate;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct TransactionRowInsert {
    pub dataset_id: DatasetId,
    pub owner: UserId,
    pub date: NaiveDate,
    pub time: Option<chrono::NaiveTime>,
    pub platform: Option<String>,
    pub category: Option<String>,
    pub product: Option<String>,
    pub status: Option<String>,
    pub sub_id: Option<String>,
    pub order_id: Option<String>,
    pub product_id: Option<String>,
    pub revenue: Decimal,
    pub commission: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub quantity: i64,
    pub fingerprint: String,
}

#[derive(Debug, Clone)]
pub struct TransactionRowDBResponse {
    pub id: TransactionRowId,
    pub dataset_id: DatasetId,
    pub owner: UserId,
    pub date: NaiveDate,
    pub time: Option<chrono::NaiveTime>,
    pub platform: Option<String>,
    pub category: Option<String>,
    pub product: Option<String>,
    pub status: Option<String>,
    pub sub_id: Option<String>,
    pub order_id: Option<String>,
    pub product_id: Option<String>,
    pub revenue: Decimal,
    pub commission: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub quantity: i64,
}
