//! Database models for datasets (§3 `Dataset`).

use crate::types::{DatasetId, DatasetStatus, DatasetType, UserId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct DatasetCreateDBRequest {
    pub owner: UserId,
    pub filename: String,
    pub dataset_type: DatasetType,
}

#[derive(Debug, Clone, Default)]
pub struct DatasetUpdateDBRequest {
    pub status: Option<DatasetStatus>,
    pub row_count: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct DatasetDBResponse {
    pub id: DatasetId,
    pub owner: UserId,
    pub filename: String,
    pub dataset_type: DatasetType,
    pub status: DatasetStatus,
    pub row_count: i64,
    pub uploaded_at: DateTime<Utc>,
}
