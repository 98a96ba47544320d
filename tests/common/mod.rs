//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use scanproxy::core::ContentStream;
use scanproxy::storage::{
    FileAttributes, MemoryStorage, ReadResponse, StorageBackend, StreamResponse, Visibility,
    WriteOptions,
};
use scanproxy::StorageResult;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;

/// A backend that records every call before delegating to `MemoryStorage`.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    inner: Arc<MemoryStorage>,
    calls: Arc<Mutex<Vec<String>>>,
    sequential_reads: bool,
}

impl RecordingBackend {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner: Arc::new(inner),
            calls: Arc::new(Mutex::new(Vec::new())),
            sequential_reads: false,
        }
    }

    /// Makes `read_stream` hand back forward-only pipes, like a socket.
    pub fn with_sequential_reads(mut self) -> Self {
        self.sequential_reads = true;
        self
    }

    /// Calls seen so far, formatted as `op:path`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn storage(&self) -> &MemoryStorage {
        &self.inner
    }

    fn record(&self, op: &str, path: &str) {
        self.calls.lock().unwrap().push(format!("{}:{}", op, path));
    }
}

#[async_trait]
impl StorageBackend for RecordingBackend {
    async fn exists(&self, path: &str) -> StorageResult<bool> {
        self.record("exists", path);
        self.inner.exists(path).await
    }

    async fn read(&self, path: &str) -> StorageResult<Option<ReadResponse>> {
        self.record("read", path);
        self.inner.read(path).await
    }

    async fn read_stream(&self, path: &str) -> StorageResult<Option<StreamResponse>> {
        self.record("read_stream", path);
        let Some(mut response) = self.inner.read_stream(path).await? else {
            return Ok(None);
        };
        if self.sequential_reads {
            let data = response.stream.read_to_end().await?;
            response.stream = pipe(data);
        }
        Ok(Some(response))
    }

    async fn list_contents(
        &self,
        directory: &str,
        recursive: bool,
    ) -> StorageResult<Vec<FileAttributes>> {
        self.record("list_contents", directory);
        self.inner.list_contents(directory, recursive).await
    }

    async fn get_metadata(&self, path: &str) -> StorageResult<Option<FileAttributes>> {
        self.record("get_metadata", path);
        self.inner.get_metadata(path).await
    }

    async fn get_size(&self, path: &str) -> StorageResult<Option<u64>> {
        self.record("get_size", path);
        self.inner.get_size(path).await
    }

    async fn get_mimetype(&self, path: &str) -> StorageResult<Option<String>> {
        self.record("get_mimetype", path);
        self.inner.get_mimetype(path).await
    }

    async fn get_timestamp(&self, path: &str) -> StorageResult<Option<i64>> {
        self.record("get_timestamp", path);
        self.inner.get_timestamp(path).await
    }

    async fn get_visibility(&self, path: &str) -> StorageResult<Option<Visibility>> {
        self.record("get_visibility", path);
        self.inner.get_visibility(path).await
    }

    async fn write(
        &self,
        path: &str,
        contents: &[u8],
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        self.record("write", path);
        self.inner.write(path, contents, options).await
    }

    async fn write_stream(
        &self,
        path: &str,
        stream: &mut ContentStream,
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        self.record("write_stream", path);
        self.inner.write_stream(path, stream, options).await
    }

    async fn update(
        &self,
        path: &str,
        contents: &[u8],
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        self.record("update", path);
        self.inner.update(path, contents, options).await
    }

    async fn update_stream(
        &self,
        path: &str,
        stream: &mut ContentStream,
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        self.record("update_stream", path);
        self.inner.update_stream(path, stream, options).await
    }

    async fn rename(&self, path: &str, new_path: &str) -> StorageResult<()> {
        self.record("rename", path);
        self.inner.rename(path, new_path).await
    }

    async fn copy(&self, path: &str, new_path: &str) -> StorageResult<()> {
        self.record("copy", path);
        self.inner.copy(path, new_path).await
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        self.record("delete", path);
        self.inner.delete(path).await
    }

    async fn delete_dir(&self, dirname: &str) -> StorageResult<()> {
        self.record("delete_dir", dirname);
        self.inner.delete_dir(dirname).await
    }

    async fn create_dir(
        &self,
        dirname: &str,
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        self.record("create_dir", dirname);
        self.inner.create_dir(dirname, options).await
    }

    async fn set_visibility(
        &self,
        path: &str,
        visibility: Visibility,
    ) -> StorageResult<FileAttributes> {
        self.record("set_visibility", path);
        self.inner.set_visibility(path, visibility).await
    }
}

/// A forward-only stream fed from a background task.
pub fn pipe(data: Vec<u8>) -> ContentStream {
    let (reader, mut writer) = tokio::io::duplex(256);
    tokio::spawn(async move {
        writer.write_all(&data).await.unwrap();
    });
    ContentStream::sequential(reader)
}

/// Installs a test subscriber so audit events show up with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
