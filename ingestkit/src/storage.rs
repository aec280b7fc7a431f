//! The Object Store Adapter (§4.2): the only component aware of the storage
//! vendor. An async-trait `Storage` contract (presign a PUT, stream a GET,
//! delete a key) with an associated error type, same shape as the rest of
//! this crate's storage-facing traits.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::{StorageError, StorageResult};

pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns a single-purpose, time-bound URL the client can PUT bytes to.
    async fn presign_put(&self, key: &str, content_type: &str, ttl: Duration) -> StorageResult<String>;

    /// Streams an object's bytes without buffering the whole object in memory.
    async fn stream_get(&self, key: &str) -> StorageResult<ByteStream>;

    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// S3-compatible implementation, configured against any endpoint that speaks
/// the S3 API (AWS S3 itself, or a self-hosted compatible store).
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    pub async fn from_config(endpoint: &str, region: &str, access_key: &str, secret_key: &str, bucket: String) -> Self {
        let credentials = aws_credential_types::Credentials::new(access_key, secret_key, None, None, "rowpipe-config");
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .load()
            .await;
        let client = aws_sdk_s3::Client::new(&config);
        Self::new(client, bucket)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn presign_put(&self, key: &str, content_type: &str, ttl: Duration) -> StorageResult<String> {
        let presign_config = aws_sdk_s3::presigning::PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Other(anyhow::Error::from(e)))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::Unreachable(e.to_string()))?;

        Ok(request.uri().to_string())
    }

    async fn stream_get(&self, key: &str) -> StorageResult<ByteStream> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Unreachable(service_err.to_string())
                }
            })?;

        let stream = output.body.map(|chunk| chunk.map_err(|e| StorageError::Unreachable(e.to_string())));
        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Unreachable(e.to_string()))?;
        Ok(())
    }
}

/// Filesystem-backed implementation used in tests and by `upload.temp_dir`
/// for local development, behind the same trait.
pub struct FsObjectStore {
    root: std::path::PathBuf,
}

impl FsObjectStore {
    pub fn new(root: std::path::PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, key: &str) -> std::path::PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn presign_put(&self, key: &str, _content_type: &str, _ttl: Duration) -> StorageResult<String> {
        Ok(format!("file://{}", self.path_for(key).display()))
    }

    async fn stream_get(&self, key: &str) -> StorageResult<ByteStream> {
        use tokio::io::AsyncReadExt;
        let mut file = tokio::fs::File::open(self.path_for(key))
            .await
            .map_err(|e| StorageError::NotFound(format!("{key}: {e}")))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .await
            .map_err(|e| StorageError::Unreachable(e.to_string()))?;
        let stream = futures::stream::once(async move { Ok(Bytes::from(buf)) });
        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        tokio::fs::remove_file(self.path_for(key))
            .await
            .map_err(|e| StorageError::Other(anyhow::Error::from(e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn fs_store_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().to_path_buf());

        tokio::fs::write(dir.path().join("key1"), b"hello world").await.unwrap();

        let mut stream = store.stream_get("key1").await.unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"hello world");

        store.delete("key1").await.unwrap();
        assert!(store.stream_get("key1").await.is_err());
    }
}
