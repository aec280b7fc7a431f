//! Database models for jobs and job chunks (§3 `Job`, `JobChunk`).

use crate::types::{DatasetId, JobId, JobStatus, UserId};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct JobCreateDBRequest {
    pub job_id: JobId,
    pub dataset_id: DatasetId,
    pub owner: UserId,
    pub storage_key: String,
}

#[derive(Debug, Clone, Default)]
pub struct JobUpdateDBRequest {
    pub status: Option<JobStatus>,
    pub total_chunks: Option<i32>,
    pub chunks_done: Option<i32>,
    pub meta: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct JobDBResponse {
    pub job_id: JobId,
    pub dataset_id: DatasetId,
    pub owner: UserId,
    pub storage_key: String,
    pub status: JobStatus,
    pub total_chunks: i32,
    pub chunks_done: i32,
    pub meta: Value,
}

#[derive(Debug, Clone)]
pub struct JobChunkUpsert {
    pub job_id: JobId,
    pub chunk_index: i32,
    pub storage_key: Option<String>,
    pub status: crate::types::ChunkStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JobChunkDBResponse {
    pub job_id: JobId,
    pub chunk_index: i32,
    pub storage_key: Option<String>,
    pub status: crate::types::ChunkStatus,
    pub error: Option<String>,
}
