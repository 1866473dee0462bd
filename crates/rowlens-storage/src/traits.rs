//! Storage trait and error types.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A persisted upload: the generated unique filename and its absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub stored_filename: String,
    pub path: PathBuf,
}

/// Storage abstraction trait
///
/// Writes allocate a collision-free filename (a freshly generated 128-bit
/// token in lowercase hex plus the supplied extension) and are atomic at
/// filesystem granularity: the file either appears with the full content or
/// not at all.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist `data` under a fresh unique filename with `extension`
    /// (including the leading dot, e.g. `.csv`).
    async fn write(&self, data: Vec<u8>, extension: &str) -> StorageResult<StoredFile>;

    /// Delete a previously written file. Deleting a file that no longer
    /// exists is not an error.
    async fn delete(&self, path: &Path) -> StorageResult<()>;
}
