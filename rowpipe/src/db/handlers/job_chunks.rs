//! Database repository for job chunks (§3 `JobChunk`), used only in
//! persisted-chunks mode (§4.3): each chunk is an independently retryable
//! object, unlike in-memory batching mode where batches are tracked purely
//! by the `jobs.chunks_done` counter.

use crate::{
    db::{
        errors::Result,
        models::jobs::{JobChunkDBResponse, JobChunkUpsert},
    },
    types::{ChunkStatus, JobId},
};
use sqlx::PgConnection;
use tracing::instrument;

pub struct JobChunks<'c> {
    db: &'c mut PgConnection,
}

impl<'c> JobChunks<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(job_id = %request.job_id, chunk_index = request.chunk_index), err)]
    pub async fn upsert(&mut self, request: &JobChunkUpsert) -> Result<JobChunkDBResponse> {
        let row = sqlx::query_as!(
            JobChunkDBResponse,
            r#"
            INSERT INTO job_chunks (job_id, chunk_index, storage_key, status, error)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (job_id, chunk_index) DO UPDATE SET
                storage_key = COALESCE(EXCLUDED.storage_key, job_chunks.storage_key),
                status = EXCLUDED.status,
                error = EXCLUDED.error
            RETURNING job_id, chunk_index, storage_key, status as "status: ChunkStatus", error
            "#,
            request.job_id,
            request.chunk_index,
            request.storage_key,
            request.status as ChunkStatus,
            request.error,
        )
        .fetch_one(&mut *self.db)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self), err)]
    pub async fn list_for_job(&mut self, job_id: JobId) -> Result<Vec<JobChunkDBResponse>> {
        let rows = sqlx::query_as!(
            JobChunkDBResponse,
            r#"
            SELECT job_id, chunk_index, storage_key, status as "status: ChunkStatus", error
            FROM job_chunks WHERE job_id = $1 ORDER BY chunk_index ASC
            "#,
            job_id
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows)
    }

    /// A job is only safe to mark `completed` once every chunk that has ever
    /// been recorded for it is `ok` (§3 `Job` invariant).
    #[instrument(skip(self), err)]
    pub async fn all_ok(&mut self, job_id: JobId) -> Result<bool> {
        let row = sqlx::query_scalar!(
            r#"SELECT COUNT(*) FILTER (WHERE status != 'ok') = 0 FROM job_chunks WHERE job_id = $1"#,
            job_id
        )
        .fetch_one(&mut *self.db)
        .await?;
        Ok(row.unwrap_or(false))
    }

    #[instrument(skip(self), err)]
    pub async fn failed_chunks(&mut self, job_id: JobId) -> Result<Vec<JobChunkDBResponse>> {
        let rows = sqlx::query_as!(
            JobChunkDBResponse,
            r#"
            SELECT job_id, chunk_index, storage_key, status as "status: ChunkStatus", error
            FROM job_chunks WHERE job_id = $1 AND status = 'failed' ORDER BY chunk_index ASC
            "#,
            job_id
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows)
    }
}
