use crate::keys::validate_object_name;
use crate::traits::{ObjectReader, ObjectStore, StorageError, StorageResult, StoredObject};
use async_trait::async_trait;
use ephemera_core::constants::WRITE_CHUNK_SIZE;
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufReader};
use uuid::Uuid;

/// Prefix of in-progress uploads. Hidden entries are never listed or served.
pub const PARTIAL_PREFIX: &str = ".partial-";

/// Read buffer size when streaming an object back out.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Local filesystem storage implementation
///
/// Objects live as regular files directly under `base_path`. Uploads are written to a
/// hidden partial file and renamed into place, so a name only ever refers to complete
/// content.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance, creating `base_path` if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_to_path(&self, name: &str) -> StorageResult<PathBuf> {
        validate_object_name(name)?;
        Ok(self.base_path.join(name))
    }

    /// Unique per write so concurrent uploads of one name never share a partial file.
    fn partial_path(&self, name: &str) -> PathBuf {
        self.base_path.join(format!(
            "{}{}-{}",
            PARTIAL_PREFIX,
            Uuid::new_v4().simple(),
            name
        ))
    }

    async fn write_partial(&self, partial: &Path, reader: ObjectReader<'_>) -> StorageResult<u64> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(partial)
            .await
            .map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to create file {}: {}",
                    partial.display(),
                    e
                ))
            })?;

        let mut reader = BufReader::with_capacity(WRITE_CHUNK_SIZE, reader);
        let bytes_copied = tokio::io::copy_buf(&mut reader, &mut file)
            .await
            .map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write stream to file {}: {}",
                    partial.display(),
                    e
                ))
            })?;

        file.flush().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to flush file {}: {}", partial.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", partial.display(), e))
        })?;

        Ok(bytes_copied)
    }
}

/// Removes a partial upload unless disarmed. Dropping an armed guard (the upload future
/// was cancelled) removes the file synchronously.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    async fn discard(mut self) {
        self.armed = false;
        if let Err(e) = fs::remove_file(&self.path).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    "Failed to remove partial upload"
                );
            }
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Removed abandoned partial upload");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    "Failed to remove abandoned partial upload"
                );
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn put<'a>(&self, name: &str, reader: ObjectReader<'a>) -> StorageResult<u64> {
        let path = self.key_to_path(name)?;
        let partial = self.partial_path(name);
        let guard = PartialFile::new(partial.clone());
        let start = std::time::Instant::now();

        let size = match self.write_partial(&partial, reader).await {
            Ok(size) => size,
            Err(e) => {
                guard.discard().await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&partial, &path).await {
            guard.discard().await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to publish file {}: {}",
                path.display(),
                e
            )));
        }
        guard.disarm();

        tracing::info!(
            path = %path.display(),
            name = %name,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage stream upload successful"
        );

        Ok(size)
    }

    async fn get(&self, name: &str) -> StorageResult<StoredObject> {
        let path = self.key_to_path(name)?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(name.to_string()));
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let metadata = file.metadata().await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to stat file {}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        let key = name.to_string();
        let path_display = path.display().to_string();
        let stream = tokio_util::io::ReaderStream::with_capacity(file, READ_CHUNK_SIZE).map(
            move |result| {
                result.map_err(|e| {
                    tracing::error!(
                        error = %e,
                        path = %path_display,
                        name = %key,
                        "Local storage stream download error"
                    );
                    StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
                })
            },
        );

        Ok(StoredObject {
            name: name.to_string(),
            content_length: metadata.len(),
            stream: Box::pin(stream),
        })
    }

    async fn delete(&self, name: &str) -> StorageResult<bool> {
        let path = self.key_to_path(name)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), name = %name, "Local storage delete successful");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.base_path).await.map_err(|e| {
            StorageError::ListFailed(format!(
                "Failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            StorageError::ListFailed(format!(
                "Failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })? {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::debug!(name = ?raw, "Skipping non UTF-8 entry");
                    continue;
                }
            };
            if name.starts_with('.') {
                continue;
            }

            match entry.file_type().await {
                Ok(file_type) if file_type.is_file() => names.push(name),
                Ok(_) => {}
                // Removed between readdir and stat.
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(error = %e, name = %name, "Failed to stat directory entry");
                }
            }
        }

        Ok(names)
    }

    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.base_path).await.map_err(|e| {
            StorageError::BackendError(format!(
                "Storage directory {} unavailable: {}",
                self.base_path.display(),
                e
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::BackendError(format!(
                "Storage path {} is not a directory",
                self.base_path.display()
            )));
        }

        Ok(())
    }
}
