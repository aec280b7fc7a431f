//! Error types for normalization, object storage, and job processing.

use thiserror::Error;

/// Why a raw record was rejected by the normalizer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("could not decode bytes as utf-8, latin-1, or iso-8859-1")]
    UndecodableBytes,

    #[error("date '{0}' did not match any accepted format")]
    InvalidDate(String),

    #[error("numeric value '{0}' for field '{1}' could not be parsed")]
    InvalidNumber(String, &'static str),
}

pub type NormalizeResult<T> = std::result::Result<T, NormalizeError>;

/// Failures from the `ObjectStore` trait. Every vendor-specific failure funnels
/// into this single kind, per the Object Store Adapter contract.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object store unreachable or timed out: {0}")]
    Unreachable(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
