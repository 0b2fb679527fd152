use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum StorageError {
    Download(String),
    Upload(String),
    Io(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Download(m) => write!(f, "download failed: {m}"),
            Self::Upload(m) => write!(f, "upload failed: {m}"),
            Self::Io(m) => write!(f, "local file error: {m}"),
        }
    }
}

impl std::error::Error for StorageError {}

// ── Store seam ─────────────────────────────────────────────────────────────────

/// Operations consumed from the storage service: move one object between
/// the bucket and a local path. A trait so stage handlers can run against
/// an in-memory store in tests; production is [`HttpObjectStore`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download `bucket/key` to `path`, overwriting it.
    async fn download(&self, bucket: &str, key: &str, path: &Path) -> Result<(), StorageError>;

    /// Upload the file at `path` to `bucket/key`.
    async fn upload(&self, path: &Path, bucket: &str, key: &str) -> Result<(), StorageError>;
}

// ── HTTP implementation ────────────────────────────────────────────────────────

/// Path-style S3-compatible object store client:
/// `GET/PUT {endpoint}/{bucket}/{key}`.
///
/// `Clone` is cheap — `reqwest::Client` is an `Arc` around a connection
/// pool; construct once in `app::run` and clone into each worker.
#[derive(Clone)]
pub struct HttpObjectStore {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpObjectStore {
    pub fn new(http: reqwest::Client, endpoint: &str) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{bucket}/{key}", self.endpoint)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn download(&self, bucket: &str, key: &str, path: &Path) -> Result<(), StorageError> {
        let response = self
            .http
            .get(self.object_url(bucket, key))
            .send()
            .await
            .map_err(|e| StorageError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Download(format!(
                "{bucket}/{key}: HTTP {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Download(e.to_string()))?;

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| StorageError::Io(format!("{}: {e}", path.display())))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| StorageError::Io(format!("{}: {e}", path.display())))?;

        tracing::info!(bucket, key, "file downloaded");
        Ok(())
    }

    async fn upload(&self, path: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::Io(format!("{}: {e}", path.display())))?;

        let response = self
            .http
            .put(self.object_url(bucket, key))
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Upload(format!(
                "{bucket}/{key}: HTTP {}",
                response.status()
            )));
        }

        tracing::info!(bucket, key, "file uploaded");
        Ok(())
    }
}
