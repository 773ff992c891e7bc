use async_trait::async_trait;
use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::models::StoredFile;
use crate::utils::validation::generate_stored_name;

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    /// The incoming body failed while being read (client or multipart fault)
    #[error("Failed to read upload body: {0}")]
    Body(#[source] io::Error),

    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Metadata describing an upload that is about to be persisted
pub struct IncomingFile<'a> {
    pub field_name: &'a str,
    pub original_name: &'a str,
    pub mime_type: &'a str,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the content directory if needed and returns its absolute path
    async fn ensure_ready(&self) -> io::Result<PathBuf>;
    async fn store_stream<'a>(
        &self,
        incoming: IncomingFile<'a>,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<StoredFile, StorageError>;
    async fn delete_file(&self, path: &Path) -> io::Result<()>;
}

/// Writes uploads into a single flat directory on local disk
pub struct LocalStorageService {
    root: PathBuf,
    max_file_size: usize,
}

impl LocalStorageService {
    pub fn new(root: impl Into<PathBuf>, max_file_size: usize) -> Self {
        Self {
            root: root.into(),
            max_file_size,
        }
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn ensure_ready(&self) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.root).await?;
        fs::canonicalize(&self.root).await
    }

    async fn store_stream<'a>(
        &self,
        incoming: IncomingFile<'a>,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<StoredFile, StorageError> {
        let dir = self.ensure_ready().await?;
        let stored_at = Utc::now();
        let generated_name = generate_stored_name(
            incoming.field_name,
            incoming.original_name,
            stored_at.timestamp_millis(),
        );
        let absolute_path = dir.join(&generated_name);

        // create_new: a name collision fails instead of clobbering another upload
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&absolute_path)
            .await?;

        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        let mut written: usize = 0;

        let result = async {
            loop {
                let n = reader.read(&mut buffer).await.map_err(StorageError::Body)?;
                if n == 0 {
                    break;
                }

                written += n;
                if written > self.max_file_size {
                    return Err(StorageError::TooLarge {
                        limit: self.max_file_size,
                    });
                }

                file.write_all(&buffer[..n]).await?;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok::<(), StorageError>(())
        }
        .await;

        if let Err(e) = result {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&absolute_path).await {
                tracing::warn!(
                    "Failed to remove partial upload {}: {}",
                    absolute_path.display(),
                    cleanup
                );
            }
            return Err(e);
        }

        tracing::info!(
            "💾 Stored {} as {} ({} bytes)",
            incoming.original_name,
            generated_name,
            written
        );

        Ok(StoredFile {
            generated_name,
            original_name: incoming.original_name.to_string(),
            absolute_path,
            size_bytes: written as u64,
            mime_type: incoming.mime_type.to_string(),
            stored_at,
        })
    }

    async fn delete_file(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn incoming<'a>(name: &'a str) -> IncomingFile<'a> {
        IncomingFile {
            field_name: "file",
            original_name: name,
            mime_type: "text/plain",
        }
    }

    #[tokio::test]
    async fn test_store_stream_writes_all_bytes() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorageService::new(dir.path().join("content"), 1024);

        let payload = b"plain text document".to_vec();
        let stored = storage
            .store_stream(incoming("notes.txt"), Box::new(Cursor::new(payload.clone())))
            .await
            .unwrap();

        assert_eq!(stored.size_bytes, payload.len() as u64);
        assert_eq!(stored.original_name, "notes.txt");
        assert!(stored.generated_name.starts_with("file-"));
        assert!(stored.generated_name.ends_with(".txt"));
        assert!(stored.absolute_path.is_absolute());
        assert_eq!(tokio::fs::read(&stored.absolute_path).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_store_stream_rejects_oversized_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorageService::new(dir.path(), 16);

        let result = storage
            .store_stream(incoming("big.txt"), Box::new(Cursor::new(vec![b'a'; 17])))
            .await;

        assert!(matches!(result, Err(StorageError::TooLarge { limit: 16 })));
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_stream_accepts_exact_limit() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorageService::new(dir.path(), 16);

        let stored = storage
            .store_stream(incoming("edge.txt"), Box::new(Cursor::new(vec![b'a'; 16])))
            .await
            .unwrap();
        assert_eq!(stored.size_bytes, 16);
    }

    #[tokio::test]
    async fn test_delete_missing_file_is_ok() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorageService::new(dir.path(), 16);
        let missing = dir.path().join("missing.txt");

        assert!(storage.delete_file(&missing).await.is_ok());
    }
}
