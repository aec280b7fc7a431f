//! The Job Orchestrator & Chunk Worker (§4.3): turns a committed upload into
//! normalized, deduplicated rows.
//!
//! Jobs are processed by an in-process tokio task pool rather than an
//! external broker (`queue.url` is accepted for forward-compatibility only,
//! §5) — a single-binary deployment shape, generalized from HTTP request
//! handling to a background job queue. [`spawn_pool`] starts a fixed number of worker
//! loops pulling job ids off an `mpsc` channel; [`enqueue`]/[`WorkerPool`]
//! is the handle the API side holds to hand off newly committed jobs.

use std::sync::Arc;

use chrono::Utc;
use ingestkit::{
    error::NormalizeError,
    job::retry::{backoff_duration, should_retry, Classification, RetryConfig},
    normalize,
    row::{DatasetKind, RawRecord},
    storage::ObjectStore,
};
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::{
    config::{Config, PipelineMode},
    db::{
        handlers::{
            click_rows::ClickRows, datasets::Datasets, jobs::Jobs, repository::Repository, transaction_rows::TransactionRows,
        },
        models::{
            click_rows::ClickRowInsert,
            datasets::DatasetUpdateDBRequest,
            jobs::JobUpdateDBRequest,
            transaction_rows::TransactionRowInsert,
        },
        tenancy::with_tenant_session,
    },
    limits::JobQueuePermit,
    types::{DatasetId, DatasetStatus, DatasetType, JobId, JobStatus, UserId},
};

/// One rejected row or failed batch, accumulated into the job's `meta.errors`
/// array and surfaced via `GET /jobs/{id}` (§6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct JobError {
    pub row_index: Option<usize>,
    pub reason: String,
}

/// A unit of work handed to a worker: which job to run, and (held for the
/// job's full lifetime per §5) the admission-control permit that must be
/// released when the job reaches a terminal state.
pub struct WorkItem {
    pub job_id: JobId,
    pub owner: UserId,
    pub dataset_id: DatasetId,
    pub dataset_type: DatasetType,
    pub storage_key: String,
    _permit: Option<JobQueuePermit>,
}

impl WorkItem {
    pub fn new(
        job_id: JobId,
        owner: UserId,
        dataset_id: DatasetId,
        dataset_type: DatasetType,
        storage_key: String,
        permit: Option<JobQueuePermit>,
    ) -> Self {
        Self {
            job_id,
            owner,
            dataset_id,
            dataset_type,
            storage_key,
            _permit: permit,
        }
    }
}

#[derive(Clone)]
pub struct WorkerPool {
    tx: mpsc::UnboundedSender<WorkItem>,
    cancellation: CancellationToken,
}

impl WorkerPool {
    /// Enqueues a committed job for processing. Never blocks: the channel is
    /// unbounded, and admission control happens earlier via [`JobQueuePermit`]
    /// (§5 backpressure is a refusal at `create_job`, not a wait here).
    pub fn enqueue(&self, item: WorkItem) {
        if self.tx.send(item).is_err() {
            tracing::error!("worker pool channel closed, job dropped");
        }
    }

    /// Signals every worker loop to stop accepting new suspension points.
    /// In-flight jobs still honor their own soft/hard timeouts.
    pub fn shutdown(&self) {
        self.cancellation.cancel();
    }
}

/// Starts `worker_count` background tasks each looping on the shared
/// channel. A single channel with multiple receivers isn't directly
/// supported by `mpsc`, so workers share one receiver behind a mutex — fine
/// here since the only contention is a quick pop, not the job processing
/// itself.
pub fn spawn_pool(pool: PgPool, store: Arc<dyn ObjectStore>, config: Arc<Config>, worker_count: usize) -> WorkerPool {
    let (tx, rx) = mpsc::unbounded_channel::<WorkItem>();
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let cancellation = CancellationToken::new();

    for worker_id in 0..worker_count.max(1) {
        let pool = pool.clone();
        let store = store.clone();
        let config = config.clone();
        let rx = rx.clone();
        let cancellation = cancellation.clone();

        tokio::spawn(async move {
            loop {
                let item = {
                    let mut guard = rx.lock().await;
                    guard.recv().await
                };
                let Some(item) = item else {
                    tracing::info!(worker_id, "worker pool channel closed, exiting");
                    break;
                };
                if cancellation.is_cancelled() {
                    tracing::warn!(worker_id, job_id = %item.job_id, "worker pool shutting down, skipping job");
                    continue;
                }
                process_job(&pool, store.as_ref(), &config, item, cancellation.child_token()).await;
            }
        });
    }

    WorkerPool { tx, cancellation }
}

/// Drives one job from `running` through to `completed`/`failed`, honoring
/// the soft/hard timeout pair (§5): on soft timeout the in-flight batch is
/// committed and the job fails with a `timeout` reason unless every row had
/// already been committed.
#[instrument(skip(pool, store, config, cancellation), fields(job_id = %item.job_id))]
async fn process_job(pool: &PgPool, store: &dyn ObjectStore, config: &Config, item: WorkItem, cancellation: CancellationToken) {
    let soft_timeout = config.job.soft_timeout_s;
    let hard_timeout = config.job.hard_timeout_s;

    let outcome = tokio::select! {
        result = tokio::time::timeout(soft_timeout, run_job(pool, store, config, &item, &cancellation)) => {
            match result {
                Ok(Ok(summary)) => Ok(summary),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err("soft timeout exceeded".to_string()),
            }
        }
        _ = tokio::time::sleep(hard_timeout) => {
            Err("hard timeout exceeded".to_string())
        }
    };

    let mark_result = with_tenant_session(pool, item.owner, |session| {
        let outcome = &outcome;
        async move {
            let mut jobs = Jobs::new(session.connection());
            let mut datasets = Datasets::new(session.connection());

            match outcome {
                Ok(summary) => {
                    jobs.update(
                        item.job_id,
                        &JobUpdateDBRequest {
                            status: Some(JobStatus::Completed),
                            total_chunks: None,
                            chunks_done: None,
                            meta: Some(serde_json::json!({ "errors": summary.errors, "rows_inserted": summary.rows_inserted })),
                        },
                    )
                    .await?;
                    datasets
                        .update(
                            item.dataset_id,
                            &DatasetUpdateDBRequest {
                                status: Some(DatasetStatus::Completed),
                                row_count: Some(summary.rows_inserted as i64),
                            },
                        )
                        .await?;
                }
                Err(reason) => {
                    jobs.update(
                        item.job_id,
                        &JobUpdateDBRequest {
                            status: Some(JobStatus::Failed),
                            total_chunks: None,
                            chunks_done: None,
                            meta: Some(serde_json::json!({ "reason": reason })),
                        },
                    )
                    .await?;
                    datasets
                        .update(
                            item.dataset_id,
                            &DatasetUpdateDBRequest {
                                status: Some(DatasetStatus::Failed),
                                row_count: None,
                            },
                        )
                        .await?;
                }
            }
            Ok(())
        }
    })
    .await;

    if let Err(e) = mark_result {
        tracing::error!(job_id = %item.job_id, error = %e, "failed to persist job terminal state");
    }
}

struct JobSummary {
    rows_inserted: u64,
    errors: Vec<JobError>,
}

/// Streams the object, normalizes each record, and batches inserts according
/// to `pipeline.mode` (§4.3): `in_memory` counts batches lazily as they fill;
/// `persisted_chunks` is reserved for pre-split fixed-byte-range chunks and
/// degrades to the same batch loop here since chunk splitting happens at
/// commit time, not during the worker's read loop.
async fn run_job(pool: &PgPool, store: &dyn ObjectStore, config: &Config, item: &WorkItem, cancellation: &CancellationToken) -> crate::errors::Result<JobSummary> {
    let retry_config = RetryConfig::default();
    let mut attempt = 0u32;

    loop {
        if cancellation.is_cancelled() {
            return Err(crate::errors::Error::Unavailable {
                message: "job cancelled".to_string(),
            });
        }
        match try_process_once(pool, store, config, item, cancellation).await {
            Ok(summary) => return Ok(summary),
            Err((classification, err)) => {
                if classification == Classification::Transient && should_retry(attempt, &retry_config) {
                    let delay = backoff_duration(attempt, &retry_config);
                    tracing::warn!(job_id = %item.job_id, attempt, ?delay, error = %err, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(err);
            }
        }
    }
}

async fn try_process_once(
    pool: &PgPool,
    store: &dyn ObjectStore,
    config: &Config,
    item: &WorkItem,
    cancellation: &CancellationToken,
) -> Result<JobSummary, (Classification, crate::errors::Error)> {
    use futures::StreamExt;

    let byte_stream = store.stream_get(&item.storage_key).await.map_err(|e| {
        (
            Classification::Transient,
            crate::errors::Error::Storage { message: e.to_string() },
        )
    })?;

    let mut buf = Vec::new();
    let mut stream = byte_stream;
    while let Some(chunk) = stream.next().await {
        if cancellation.is_cancelled() {
            return Err((
                Classification::Permanent,
                crate::errors::Error::Unavailable {
                    message: "job cancelled".to_string(),
                },
            ));
        }
        let chunk = chunk.map_err(|e| {
            (
                Classification::Transient,
                crate::errors::Error::Storage { message: e.to_string() },
            )
        })?;
        buf.extend_from_slice(&chunk);
    }

    let text = normalize::decode_bytes(&buf).map_err(|e| {
        (
            Classification::Permanent,
            crate::errors::Error::Validation { message: e.to_string() },
        )
    })?;

    let delimiter = detect_delimiter(&text);
    let mut reader = csv::ReaderBuilder::new().delimiter(delimiter).has_headers(true).from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| {
            (
                Classification::Permanent,
                crate::errors::Error::Validation { message: format!("unparseable CSV header: {e}") },
            )
        })?
        .iter()
        .map(|s| s.to_string())
        .collect();

    let kind = match item.dataset_type {
        DatasetType::Transaction => DatasetKind::Transaction,
        DatasetType::Click => DatasetKind::Click,
    };

    let mut errors = Vec::new();
    let mut transaction_batch: Vec<TransactionRowInsert> = Vec::new();
    let mut click_batch: Vec<ClickRowInsert> = Vec::new();
    let mut rows_inserted: u64 = 0;
    let mut batches_done: u32 = 0;

    for (line_number, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            (
                Classification::Permanent,
                crate::errors::Error::Validation { message: format!("unparseable CSV row {line_number}: {e}") },
            )
        })?;

        let fields: Vec<(String, String)> = headers.iter().cloned().zip(record.iter().map(|v| v.to_string())).collect();
        let raw = RawRecord { fields, line_number };

        match normalize::normalize(&raw, kind) {
            Ok(ingestkit::row::CanonicalRow::Transaction(row)) => transaction_batch.push(TransactionRowInsert {
                dataset_id: item.dataset_id,
                owner: item.owner,
                date: row.date,
                time: row.time,
                platform: row.platform,
                category: row.category,
                product: Some(row.product),
                status: row.status,
                sub_id: row.sub_id,
                order_id: row.order_id,
                product_id: row.product_id,
                revenue: row.revenue,
                commission: row.commission,
                cost: row.cost,
                profit: row.profit,
                quantity: row.quantity as i64,
                fingerprint: row.fingerprint,
            }),
            Ok(ingestkit::row::CanonicalRow::Click(row)) => click_batch.push(ClickRowInsert {
                dataset_id: item.dataset_id,
                owner: item.owner,
                date: row.date,
                time: row.time,
                channel: row.channel,
                sub_id: row.sub_id,
                clicks: row.clicks as i64,
                fingerprint: row.fingerprint,
            }),
            Err(e) => {
                record_error_reason(&mut errors, line_number, &e);
            }
        }

        let batch_full = transaction_batch.len() >= config.worker.batch_size || click_batch.len() >= config.worker.batch_size;
        if batch_full {
            rows_inserted += flush_batch(pool, item.owner, &mut transaction_batch, &mut click_batch)
                .await
                .map_err(|e| (Classification::Transient, e))?;
            batches_done += 1;
            record_batch_progress(pool, item.owner, item.job_id, batches_done).await;
        }
    }

    if !transaction_batch.is_empty() || !click_batch.is_empty() {
        rows_inserted += flush_batch(pool, item.owner, &mut transaction_batch, &mut click_batch)
            .await
            .map_err(|e| (Classification::Transient, e))?;
        batches_done += 1;
        record_batch_progress(pool, item.owner, item.job_id, batches_done).await;
    }

    finalize_total_chunks(pool, item.owner, item.job_id, batches_done as i32).await;

    Ok(JobSummary { rows_inserted, errors })
}

fn record_error_reason(errors: &mut Vec<JobError>, line_number: usize, err: &NormalizeError) {
    errors.push(JobError {
        row_index: Some(line_number),
        reason: err.to_string(),
    });
}

fn detect_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.contains('\t') {
        b'\t'
    } else if first_line.contains(';') {
        b';'
    } else {
        b','
    }
}

async fn flush_batch(
    pool: &PgPool,
    owner: UserId,
    transaction_batch: &mut Vec<TransactionRowInsert>,
    click_batch: &mut Vec<ClickRowInsert>,
) -> crate::errors::Result<u64> {
    let inserted = with_tenant_session(pool, owner, |session| {
        let transaction_batch = std::mem::take(transaction_batch);
        let click_batch = std::mem::take(click_batch);
        async move {
            let mut inserted = 0u64;
            if !transaction_batch.is_empty() {
                inserted += TransactionRows::new(session.connection()).insert_batch(&transaction_batch).await?;
            }
            if !click_batch.is_empty() {
                inserted += ClickRows::new(session.connection()).insert_batch(&click_batch).await?;
            }
            Ok(inserted)
        }
    })
    .await?;
    Ok(inserted)
}

/// Bumps `chunks_done`; best-effort — a failure here is logged but does not
/// fail the job, since the authoritative row data was already committed.
async fn record_batch_progress(pool: &PgPool, owner: UserId, job_id: JobId, _batches_done: u32) {
    let result = with_tenant_session(pool, owner, |session| async move {
        Jobs::new(session.connection()).record_chunk_done(job_id).await
    })
    .await;
    if let Err(e) = result {
        tracing::warn!(%job_id, error = %e, "failed to record batch progress");
    }
}

/// Sets `total_chunks` once the final batch count is known, so
/// [`Jobs::record_chunk_done`]'s completion check (`chunks_done >=
/// total_chunks`) can fire on the last batch. In-memory mode doesn't know the
/// total ahead of time (§4.3), so this is set retroactively rather than
/// up front.
async fn finalize_total_chunks(pool: &PgPool, owner: UserId, job_id: JobId, total_chunks: i32) {
    let result = with_tenant_session(pool, owner, |session| async move {
        Jobs::new(session.connection())
            .update(
                job_id,
                &JobUpdateDBRequest {
                    status: None,
                    total_chunks: Some(total_chunks),
                    chunks_done: None,
                    meta: None,
                },
            )
            .await
    })
    .await;
    if let Err(e) = result {
        tracing::warn!(%job_id, error = %e, "failed to finalize total_chunks");
    }
}

/// Builds the storage key for a newly created job's upload (§4.2: keys are
/// opaque, one per upload).
pub fn storage_key_for(job_id: JobId) -> String {
    format!("uploads/{}/{}.csv", Utc::now().format("%Y/%m/%d"), job_id)
}

pub use PipelineMode as Mode;
