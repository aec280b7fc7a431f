//! Common type definitions shared across the application.
//!
//! Entity identifiers follow §3 of the data model: most entities are
//! `int64`-keyed (Postgres `bigserial`), with `Job` the one UUID-keyed
//! exception (job ids are handed to clients as opaque tokens before any
//! database row may exist for a not-yet-committed upload).

use uuid::Uuid;

pub type UserId = i64;
pub type DatasetId = i64;
pub type TransactionRowId = i64;
pub type ClickRowId = i64;
pub type AdSpendId = i64;
pub type JobId = Uuid;

/// Abbreviates a job UUID to its first 8 characters for readable logs.
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DatasetType {
    Transaction,
    Click,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DatasetStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Pending,
    Ok,
    Failed,
}
