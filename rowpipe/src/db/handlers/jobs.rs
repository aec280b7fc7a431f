//! Database repository for jobs (§3 `Job`, §4.3 lifecycle).
//!
//! Persists the serialized projection of whichever [`ingestkit::job::JobState`]
//! a job last transitioned into. The typestate module owns transition rules;
//! this repository only owns reading and writing the row.

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::jobs::{JobCreateDBRequest, JobDBResponse, JobUpdateDBRequest},
    },
    types::{DatasetId, JobId, JobStatus, UserId},
};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub owner: UserId,
    pub skip: i64,
    pub limit: i64,
}

pub struct Jobs<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Jobs<'c> {
    type CreateRequest = JobCreateDBRequest;
    type UpdateRequest = JobUpdateDBRequest;
    type Response = JobDBResponse;
    type Id = JobId;
    type Filter = JobFilter;

    #[instrument(skip(self, request), fields(job_id = %request.job_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let row = sqlx::query_as!(
            JobDBResponse,
            r#"
            INSERT INTO jobs (job_id, dataset_id, owner, storage_key, status, total_chunks, chunks_done, meta)
            VALUES ($1, $2, $3, $4, 'queued', 0, 0, '{}'::jsonb)
            RETURNING job_id, dataset_id, owner, storage_key, status as "status: JobStatus", total_chunks, chunks_done, meta
            "#,
            request.job_id,
            request.dataset_id,
            request.owner,
            request.storage_key,
        )
        .fetch_one(&mut *self.db)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let row = sqlx::query_as!(
            JobDBResponse,
            r#"
            SELECT job_id, dataset_id, owner, storage_key, status as "status: JobStatus", total_chunks, chunks_done, meta
            FROM jobs WHERE job_id = $1
            "#,
            id
        )
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<JobId>) -> Result<std::collections::HashMap<Self::Id, JobDBResponse>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }
        let rows = sqlx::query_as!(
            JobDBResponse,
            r#"
            SELECT job_id, dataset_id, owner, storage_key, status as "status: JobStatus", total_chunks, chunks_done, meta
            FROM jobs WHERE job_id = ANY($1)
            "#,
            ids.as_slice()
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows.into_iter().map(|r| (r.job_id, r)).collect())
    }

    #[instrument(skip(self, filter), fields(owner = filter.owner), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let rows = sqlx::query_as!(
            JobDBResponse,
            r#"
            SELECT job_id, dataset_id, owner, storage_key, status as "status: JobStatus", total_chunks, chunks_done, meta
            FROM jobs WHERE owner = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3
            "#,
            filter.owner,
            filter.limit,
            filter.skip
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query!("DELETE FROM jobs WHERE job_id = $1", id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Updates the persisted projection of a job's typestate. `status`
    /// transitions are monotonic (§4.3); the caller (the orchestrator, not
    /// this repository) is responsible for only ever calling this with a
    /// state reachable from the job's current one.
    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let row = sqlx::query_as!(
            JobDBResponse,
            r#"
            UPDATE jobs SET
                status = COALESCE($2, status),
                total_chunks = COALESCE($3, total_chunks),
                chunks_done = COALESCE($4, chunks_done),
                meta = COALESCE($5, meta)
            WHERE job_id = $1
            RETURNING job_id, dataset_id, owner, storage_key, status as "status: JobStatus", total_chunks, chunks_done, meta
            "#,
            id,
            request.status as Option<JobStatus>,
            request.total_chunks,
            request.chunks_done,
            request.meta,
        )
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(row)
    }
}

impl<'c> Jobs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Atomically transitions `queued -> running` (§4.3), so a second
    /// concurrent commit of the same job observes zero rows affected rather
    /// than racing a read-then-write. Returns `None` if the job wasn't in
    /// `queued` status (already committed, or never existed).
    #[instrument(skip(self), err)]
    pub async fn try_start(&mut self, id: JobId) -> Result<Option<JobDBResponse>> {
        let row = sqlx::query_as!(
            JobDBResponse,
            r#"
            UPDATE jobs SET status = 'running'
            WHERE job_id = $1 AND status = 'queued'
            RETURNING job_id, dataset_id, owner, storage_key, status as "status: JobStatus", total_chunks, chunks_done, meta
            "#,
            id
        )
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(row)
    }

    /// Monotonically bumps `chunks_done` by one and, if every chunk is now
    /// done, flips `status` to `completed` in the same statement — avoids a
    /// read-modify-write race between two workers committing chunks of the
    /// same job concurrently (§5 `chunks_done` is monotonically non-decreasing).
    #[instrument(skip(self), err)]
    pub async fn record_chunk_done(&mut self, id: JobId) -> Result<JobDBResponse> {
        let row = sqlx::query_as!(
            JobDBResponse,
            r#"
            UPDATE jobs SET
                chunks_done = chunks_done + 1,
                status = CASE WHEN chunks_done + 1 >= total_chunks AND total_chunks > 0 THEN 'completed' ELSE status END
            WHERE job_id = $1
            RETURNING job_id, dataset_id, owner, storage_key, status as "status: JobStatus", total_chunks, chunks_done, meta
            "#,
            id
        )
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(row)
    }

    #[instrument(skip(self), err)]
    pub async fn list_queued_for_dataset(&mut self, dataset_id: DatasetId) -> Result<Vec<JobDBResponse>> {
        let rows = sqlx::query_as!(
            JobDBResponse,
            r#"
            SELECT job_id, dataset_id, owner, storage_key, status as "status: JobStatus", total_chunks, chunks_done, meta
            FROM jobs WHERE dataset_id = $1 AND status IN ('queued', 'running')
            "#,
            dataset_id
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows)
    }
}
