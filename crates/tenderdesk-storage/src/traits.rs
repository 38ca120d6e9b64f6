//! Storage abstraction trait

use async_trait::async_trait;
use tenderdesk_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Stored file {}", key)),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Object storage contract used by the upload handlers and the orchestrator.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `key` and return its URL.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> StorageResult<String>;

    /// Read back the bytes stored under `key`.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Remove the object stored under `key`. Missing objects are not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}
