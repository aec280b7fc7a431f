//! `ingestkit` — row normalization, fingerprinting, object storage, and job
//! lifecycle primitives for the ingestion pipeline.
//!
//! This crate is storage-agnostic: it knows nothing about HTTP or a specific
//! database. The application crate (`rowpipe`) drives these primitives from
//! its own Postgres-backed repositories and axum handlers.
//!
//! # Modules
//!
//! - [`row`]: canonical `TransactionRow`/`ClickRow` types and the raw record
//!   the normalizer consumes.
//! - [`normalize`]: column detection, type coercion, derived fields, and
//!   multi-encoding decode fallback.
//! - [`fingerprint`]: the content-addressed dedup key.
//! - [`storage`]: the `ObjectStore` trait plus S3 and filesystem
//!   implementations.
//! - [`job`]: the job/chunk lifecycle typestate and retry/backoff utilities.
//! - [`error`]: error types shared across the above.

pub mod error;
pub mod fingerprint;
pub mod job;
pub mod normalize;
pub mod row;
pub mod storage;

pub use error::{NormalizeError, NormalizeResult, StorageError, StorageResult};
pub use job::{Completed, Failed, Job, JobState, Queued, Running};
pub use row::{CanonicalRow, ClickRow, DatasetKind, RawRecord, TransactionRow};
pub use storage::{ByteStream, FsObjectStore, ObjectStore, S3ObjectStore};
