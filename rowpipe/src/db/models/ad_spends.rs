//! Database models for ad spends (§3 `AdSpend`).

use crate::types::{AdSpendId, UserId};
use chrono::NaiveDate;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct AdSpendCreateDBRequest {
    pub owner: UserId,
    pub date: NaiveDate,
    pub sub_id: Option<String>,
    pub amount: Decimal,
    pub clicks: i64,
}

#[derive(Debug, Clone, Default)]
pub struct AdSpendUpdateDBRequest {
    pub amount: Option<Decimal>,
    pub clicks: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AdSpendDBResponse {
    pub id: AdSpendId,
    pub owner: UserId,
    pub date: NaiveDate,
    pub sub_id: Option<String>,
    pub amount: Decimal,
    pub clicks: i64,
}
