//! `/jobs` handlers (§4.3, §6): create a job, commit it for processing, poll
//! status, delete.

use std::time::Duration;

use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        jobs::{CreateJobRequest, CreateJobResponse, JobErrorEntry, JobStatusResponse},
        users::CurrentUser,
    },
    db::{
        handlers::{Datasets, Jobs, Repository},
        models::{datasets::DatasetCreateDBRequest, jobs::JobCreateDBRequest},
        tenancy::with_tenant_session,
    },
    errors::{Error, Result},
    orchestrator::{self, WorkItem},
};

const PRESIGN_TTL: Duration = Duration::from_secs(900);

/// `POST /jobs` (§6): creates a dataset + job row and returns a presigned
/// upload URL. Subject to job-queue admission control (§5): refused with 503
/// once `worker.queue_high_water_mark` jobs are already in flight.
pub async fn create_job(State(state): State<AppState>, user: CurrentUser, Json(request): Json<CreateJobRequest>) -> Result<Json<CreateJobResponse>> {
    let permit = state.limiters.job_queue.as_ref().map(|l| l.try_acquire()).transpose()?;

    let job_id = Uuid::new_v4();
    let storage_key = orchestrator::storage_key_for(job_id);
    let filename = request.filename.clone();

    let (_dataset, job) = with_tenant_session(&state.db, user.id, |session| async move {
        let mut datasets = Datasets::new(session.connection());
        let dataset = datasets
            .create(&DatasetCreateDBRequest {
                owner: user.id,
                filename,
                dataset_type: request.dataset_type,
            })
            .await?;

        let mut jobs = Jobs::new(session.connection());
        let job = jobs
            .create(&JobCreateDBRequest {
                job_id,
                dataset_id: dataset.id,
                owner: user.id,
                storage_key,
            })
            .await?;

        Ok((dataset, job))
    })
    .await?;

    let upload_url = state
        .object_store
        .presign_put(&job.storage_key, "text/csv", PRESIGN_TTL)
        .await
        .map_err(|e| Error::Storage { message: e.to_string() })?;

    // Held until commit_job hands it into the worker's WorkItem, or
    // delete_job drops an uncommitted job — either way the slot is released
    // when the job leaves the queue (§5).
    if let Some(permit) = permit {
        state.job_permits.insert(job.job_id, permit);
    }

    Ok(Json(CreateJobResponse {
        job_id: job.job_id,
        upload_url,
        storage_key: job.storage_key,
    }))
}

/// `POST /jobs/{id}/commit` (§6): enqueues the job for processing once the
/// client has finished uploading to the presigned URL.
pub async fn commit_job(State(state): State<AppState>, user: CurrentUser, Path(job_id): Path<Uuid>) -> Result<Json<JobStatusResponse>> {
    let started = with_tenant_session(&state.db, user.id, |session| async move {
        let mut jobs = Jobs::new(session.connection());
        jobs.try_start(job_id).await
    })
    .await?;

    let job = match started {
        Some(job) => job,
        None => {
            // Zero rows affected: either the job doesn't exist/isn't ours, or it
            // was already committed by a prior (possibly concurrent) request.
            let existing = with_tenant_session(&state.db, user.id, |session| async move { Jobs::new(session.connection()).get_by_id(job_id).await }).await?;
            return match existing {
                None => Err(Error::NotFound {
                    resource: "job".to_string(),
                    id: job_id.to_string(),
                }),
                Some(job) => Err(Error::Conflict {
                    message: format!("job {job_id} has already been committed (status: {:?})", job.status),
                }),
            };
        }
    };

    let dataset = with_tenant_session(&state.db, user.id, |session| async move { Datasets::new(session.connection()).get_by_id(job.dataset_id).await })
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "dataset".to_string(),
            id: job.dataset_id.to_string(),
        })?;

    let permit = state.job_permits.remove(&job.job_id).map(|(_, permit)| permit);
    state
        .worker_pool
        .enqueue(WorkItem::new(job.job_id, user.id, job.dataset_id, dataset.dataset_type, job.storage_key, permit));

    Ok(Json(JobStatusResponse {
        job_id: job.job_id,
        status: job.status,
        total_chunks: job.total_chunks,
        chunks_done: job.chunks_done,
        row_count: dataset.row_count,
        errors: Vec::new(),
    }))
}

/// `GET /jobs/{id}` (§6): reads the job row directly (never a cache), so a
/// polling client observes a linearizable history (§5).
pub async fn get_job(State(state): State<AppState>, user: CurrentUser, Path(job_id): Path<Uuid>) -> Result<Json<JobStatusResponse>> {
    let job = with_tenant_session(&state.db, user.id, |session| async move { Jobs::new(session.connection()).get_by_id(job_id).await })
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "job".to_string(),
            id: job_id.to_string(),
        })?;

    let dataset = with_tenant_session(&state.db, user.id, |session| async move { Datasets::new(session.connection()).get_by_id(job.dataset_id).await })
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "dataset".to_string(),
            id: job.dataset_id.to_string(),
        })?;

    let errors = job
        .meta
        .get("errors")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|e| {
                    Some(JobErrorEntry {
                        chunk_index: e.get("chunk_index").and_then(|v| v.as_i64()).map(|v| v as i32),
                        row_index: e.get("row_index").and_then(|v| v.as_u64()).map(|v| v as usize),
                        reason: e.get("reason")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Json(JobStatusResponse {
        job_id: job.job_id,
        status: job.status,
        total_chunks: job.total_chunks,
        chunks_done: job.chunks_done,
        row_count: dataset.row_count,
        errors,
    }))
}

/// `DELETE /jobs/{id}` (§6, §5): cooperative cancellation — marks the job
/// failed so the worker loop's next suspension-point check observes it; an
/// already-enqueued job does not stop immediately (§5).
pub async fn delete_job(State(state): State<AppState>, user: CurrentUser, Path(job_id): Path<Uuid>) -> Result<Json<serde_json::Value>> {
    let deleted = with_tenant_session(&state.db, user.id, |session| async move { Jobs::new(session.connection()).delete(job_id).await }).await?;

    if !deleted {
        return Err(Error::NotFound {
            resource: "job".to_string(),
            id: job_id.to_string(),
        });
    }

    // Drop any permit still held for a job deleted before it was committed.
    state.job_permits.remove(&job_id);

    Ok(Json(serde_json::json!({ "deleted": true })))
}
