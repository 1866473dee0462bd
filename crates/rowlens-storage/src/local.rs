//! Local filesystem storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::traits::{Storage, StorageError, StorageResult, StoredFile};

/// Flat-directory storage under a single base path. Filenames are
/// `<32 hex chars><extension>`; no subdirectories.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create the base directory if needed and resolve it to an absolute
    /// path, so stored records carry stable absolute `file_path`s.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create upload directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let base_path = tokio::task::spawn_blocking({
            let p = base_path.clone();
            move || p.canonicalize()
        })
        .await
        .map_err(|e| StorageError::ConfigError(format!("spawn_blocking failed: {}", e)))?
        .map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize upload directory: {}", e))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn allocate_filename(extension: &str) -> String {
        format!("{}{}", Uuid::new_v4().simple(), extension)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn write(&self, data: Vec<u8>, extension: &str) -> StorageResult<StoredFile> {
        let stored_filename = Self::allocate_filename(extension);
        let path = self.base_path.join(&stored_filename);
        // Write to a temp name and rename into place; a failed write never
        // leaves a partial file at the final path.
        let tmp_path = self.base_path.join(format!("{}.tmp", stored_filename));
        let size = data.len();

        let start = std::time::Instant::now();

        let write_result = async {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &path).await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = write_result {
            tracing::error!(path = %path.display(), error = %e, "Local storage write failed");
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::WriteFailed(format!(
                "Failed to write file {}: {}",
                path.display(),
                e
            )));
        }

        tracing::info!(
            path = %path.display(),
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(StoredFile {
            stored_filename,
            path,
        })
    }

    async fn delete(&self, path: &Path) -> StorageResult<()> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(path).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Local storage delete failed");
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(path = %path.display(), "Local storage delete successful");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_allocates_hex_token_with_extension() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let stored = storage.write(b"a,b\n1,2\n".to_vec(), ".csv").await.unwrap();

        assert!(stored.stored_filename.ends_with(".csv"));
        let token = stored.stored_filename.trim_end_matches(".csv");
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(stored.path.is_absolute());

        let on_disk = fs::read(&stored.path).await.unwrap();
        assert_eq!(on_disk, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_writes_get_distinct_names() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let first = storage.write(b"x".to_vec(), ".csv").await.unwrap();
        let second = storage.write(b"x".to_vec(), ".csv").await.unwrap();

        assert_ne!(first.stored_filename, second.stored_filename);
        assert_ne!(first.path, second.path);
    }

    #[tokio::test]
    async fn test_delete_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let stored = storage.write(b"data".to_vec(), ".csv").await.unwrap();
        assert!(fs::try_exists(&stored.path).await.unwrap());

        storage.delete(&stored.path).await.unwrap();
        assert!(!fs::try_exists(&stored.path).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_nonexistent_is_ok() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let path = dir.path().join("missing.csv");
        assert!(storage.delete(&path).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        storage.write(b"data".to_vec(), ".csv").await.unwrap();

        let mut entries = fs::read_dir(storage.base_path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().to_string();
            assert!(!name.ends_with(".tmp"), "leftover temp file: {}", name);
        }
    }
}
