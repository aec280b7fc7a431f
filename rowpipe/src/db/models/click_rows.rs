//! Database models for click rows (§3 `ClickRow`).

use crate::types::{ClickRowId, DatasetId, UserId};
use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct ClickRowInsert {
    pub dataset_id: DatasetId,
    pub owner: UserId,
    pub date: NaiveDate,
    pub time: Option<chrono::NaiveTime>,
    pub channel: String,
    pub sub_id: Option<String>,
    pub clicks: i64,
    pub fingerprint: String,
}

#[derive(Debug, Clone)]
pub struct ClickRowDBResponse {
    pub id: ClickRowId,
    pub dataset_id: DatasetId,
    pub owner: UserId,
    pub date: NaiveDate,
    pub time: Option<chrono::NaiveTime>,
    pub channel: String,
    pub sub_id: Option<String>,
    pub clicks: i64,
}
