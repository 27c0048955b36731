//! Storage abstraction trait
//!
//! This module defines the [`ObjectStore`] trait the rest of the service talks to. A store
//! is a flat namespace of named byte blobs; it knows nothing about expiry.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Listing failed: {0}")]
    ListFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object name: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Source of bytes for [`ObjectStore::put`]. May borrow from the request it streams.
pub type ObjectReader<'a> = Pin<Box<dyn AsyncRead + Send + 'a>>;

/// Chunked body of a stored object.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// An object opened for reading.
pub struct StoredObject {
    pub name: String,
    pub content_length: u64,
    pub stream: ByteStream,
}

impl std::fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredObject")
            .field("name", &self.name)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Named-object store shared by request handlers and the expiry sweeper.
///
/// Every operation is scoped to a single name and safe to run concurrently with any
/// other operation on the same store, including from other processes sharing the
/// same backing directory.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `reader` to completion under `name` and return the number of bytes stored.
    ///
    /// The object becomes visible only once fully written. On failure, or if the
    /// returned future is dropped, nothing is left behind under `name` or elsewhere.
    async fn put<'a>(&self, name: &str, reader: ObjectReader<'a>) -> StorageResult<u64>;

    /// Open an object for streaming. A missing object (including one deleted while
    /// being opened) is [`StorageError::NotFound`].
    async fn get(&self, name: &str) -> StorageResult<StoredObject>;

    /// Remove an object. Returns `true` if this call removed it and `false` if it was
    /// already absent; absence is never an error.
    async fn delete(&self, name: &str) -> StorageResult<bool>;

    /// Names of all committed objects, in no particular order.
    async fn list(&self) -> StorageResult<Vec<String>>;

    /// Check that the backing storage is reachable.
    async fn health_check(&self) -> StorageResult<()>;
}
