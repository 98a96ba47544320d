//! Storage backend trait definition.

use crate::core::{ContentStream, StorageResult};
use crate::storage::types::{FileAttributes, ReadResponse, StreamResponse, Visibility, WriteOptions};

use async_trait::async_trait;
use std::fmt::Debug;

/// Uniform operations over named paths of a storage backend.
///
/// Queries that may find nothing return `Ok(None)`; that is the "not
/// found" sentinel and is distinct from a failure.
///
/// Stream arguments are borrowed: the backend reads from the stream's
/// current position and the caller keeps the handle.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use scanproxy::storage::{StorageBackend, ReadResponse};
/// use scanproxy::core::StorageResult;
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct ObjectStore { /* client */ }
///
/// #[async_trait]
/// impl StorageBackend for ObjectStore {
///     async fn read(&self, path: &str) -> StorageResult<Option<ReadResponse>> {
///         // GET the object, Ok(None) on 404
///         todo!()
///     }
///
///     // ...
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    /// Checks whether a file or directory exists.
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Reads a whole file.
    async fn read(&self, path: &str) -> StorageResult<Option<ReadResponse>>;

    /// Opens a file as a stream.
    async fn read_stream(&self, path: &str) -> StorageResult<Option<StreamResponse>>;

    /// Lists the contents of a directory.
    async fn list_contents(&self, directory: &str, recursive: bool)
        -> StorageResult<Vec<FileAttributes>>;

    /// Returns all metadata of a file or directory.
    async fn get_metadata(&self, path: &str) -> StorageResult<Option<FileAttributes>>;

    /// Returns the size of a file.
    async fn get_size(&self, path: &str) -> StorageResult<Option<u64>>;

    /// Returns the MIME type of a file.
    async fn get_mimetype(&self, path: &str) -> StorageResult<Option<String>>;

    /// Returns the last modification time of a file.
    async fn get_timestamp(&self, path: &str) -> StorageResult<Option<i64>>;

    /// Returns the visibility of a file.
    async fn get_visibility(&self, path: &str) -> StorageResult<Option<Visibility>>;

    /// Writes a new file.
    async fn write(
        &self,
        path: &str,
        contents: &[u8],
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes>;

    /// Writes a new file from a stream.
    async fn write_stream(
        &self,
        path: &str,
        stream: &mut ContentStream,
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes>;

    /// Replaces the contents of an existing file.
    async fn update(
        &self,
        path: &str,
        contents: &[u8],
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes>;

    /// Replaces the contents of an existing file from a stream.
    async fn update_stream(
        &self,
        path: &str,
        stream: &mut ContentStream,
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes>;

    /// Renames a file.
    async fn rename(&self, path: &str, new_path: &str) -> StorageResult<()>;

    /// Copies a file.
    async fn copy(&self, path: &str, new_path: &str) -> StorageResult<()>;

    /// Deletes a file.
    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// Deletes a directory and everything below it.
    async fn delete_dir(&self, dirname: &str) -> StorageResult<()>;

    /// Creates a directory.
    async fn create_dir(&self, dirname: &str, options: &WriteOptions)
        -> StorageResult<FileAttributes>;

    /// Changes the visibility of a file.
    async fn set_visibility(&self, path: &str, visibility: Visibility)
        -> StorageResult<FileAttributes>;
}
