//! API-facing job models (§3 `Job`, §4.3, §6).

use serde::{Deserialize, Serialize};

use crate::types::{DatasetType, JobId, JobStatus};

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    #[serde(rename = "type")]
    pub dataset_type: DatasetType,
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: JobId,
    pub upload_url: String,
    pub storage_key: String,
}

/// One entry in a job's `errors[]` (§6, §7): row-level normalization
/// rejections and permanently-failed chunks both surface here, identified by
/// whichever index applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobErrorEntry {
    pub chunk_index: Option<i32>,
    pub row_index: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub total_chunks: i32,
    pub chunks_done: i32,
    pub row_count: i64,
    pub errors: Vec<JobErrorEntry>,
}
