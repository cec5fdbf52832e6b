//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use async_trait::async_trait;
use imgopt_core::OptimizeError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

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

impl From<StorageError> for OptimizeError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => OptimizeError::SourceNotFound(key),
            other => OptimizeError::Storage(other.to_string()),
        }
    }
}

/// Storage abstraction trait
///
/// All storage backends must implement this trait so the optimizer can read
/// back files that are not held in memory, without coupling to a specific
/// backend. See the crate root documentation for the key format.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Download a file by its storage key. The optimizer only ever reads.
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Write side for the host: places library and meta files under the
    /// keys the optimizer reads from
    async fn upload_with_key(&self, storage_key: &str, data: Vec<u8>) -> StorageResult<()>;
}
