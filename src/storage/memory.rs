//! In-memory storage backend.
//!
//! Keeps every file in a map guarded by a lock. Useful as a reference
//! implementation of the contract and as a delegate in tests.

use crate::core::{ContentStream, StorageError, StorageResult};
use crate::storage::traits::StorageBackend;
use crate::storage::types::{
    FileAttributes, ReadResponse, StreamResponse, Visibility, WriteOptions,
};

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct StoredFile {
    contents: Vec<u8>,
    mimetype: String,
    visibility: Visibility,
    timestamp: i64,
}

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<String, StoredFile>,
    /// Explicitly created directories. Parents of files exist implicitly.
    dirs: BTreeSet<String>,
}

impl Tree {
    fn dir_exists(&self, dir: &str) -> bool {
        if dir.is_empty() || self.dirs.contains(dir) {
            return true;
        }
        let prefix = format!("{}/", dir);
        self.files.keys().any(|p| p.starts_with(&prefix))
            || self.dirs.iter().any(|d| d.starts_with(&prefix))
    }

    /// Every directory, explicit or implied by a file path.
    fn all_dirs(&self) -> BTreeSet<String> {
        let mut dirs = self.dirs.clone();
        for path in self.files.keys().chain(self.dirs.iter()) {
            let mut current = path.as_str();
            while let Some((parent, _)) = current.rsplit_once('/') {
                dirs.insert(parent.to_string());
                current = parent;
            }
        }
        dirs
    }
}

/// A storage backend that lives entirely in memory.
///
/// # Examples
///
/// ```rust
/// use scanproxy::storage::MemoryStorage;
///
/// let storage = MemoryStorage::new().with_file("docs/readme.txt", b"hello");
/// assert_eq!(storage.contents("docs/readme.txt"), Some(b"hello".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tree: RwLock<Tree>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with a file.
    pub fn with_file(self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        let path = normalize(path);
        let file = new_file(&path, contents.into(), &WriteOptions::default());
        self.write_tree().files.insert(path, file);
        self
    }

    /// Returns the stored contents of a file.
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.read_tree()
            .files
            .get(&normalize(path))
            .map(|f| f.contents.clone())
    }

    /// Returns the number of stored files.
    pub fn file_count(&self) -> usize {
        self.read_tree().files.len()
    }

    fn read_tree(&self) -> RwLockReadGuard<'_, Tree> {
        self.tree.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_tree(&self) -> RwLockWriteGuard<'_, Tree> {
        self.tree.write().unwrap_or_else(|e| e.into_inner())
    }

    fn store(&self, path: &str, contents: Vec<u8>, options: &WriteOptions) -> FileAttributes {
        let path = normalize(path);
        let file = new_file(&path, contents, options);
        let attributes = file_attributes(&path, &file);
        self.write_tree().files.insert(path, file);
        attributes
    }

    fn replace(
        &self,
        path: &str,
        contents: Vec<u8>,
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        let key = normalize(path);
        let mut tree = self.write_tree();
        let file = tree
            .files
            .get_mut(&key)
            .ok_or_else(|| not_found(path))?;

        file.contents = contents;
        file.timestamp = now();
        if let Some(mimetype) = &options.mimetype {
            file.mimetype = mimetype.clone();
        }
        if let Some(visibility) = options.visibility {
            file.visibility = visibility;
        }
        Ok(file_attributes(&key, file))
    }

    fn file_field<T>(&self, path: &str, f: impl FnOnce(&StoredFile) -> T) -> Option<T> {
        self.read_tree().files.get(&normalize(path)).map(f)
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn not_found(path: &str) -> StorageError {
    StorageError::backend(path, "file not found")
}

fn guess_mimetype(path: &str) -> &'static str {
    let extension = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("txt") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

fn new_file(path: &str, contents: Vec<u8>, options: &WriteOptions) -> StoredFile {
    StoredFile {
        contents,
        mimetype: options
            .mimetype
            .clone()
            .unwrap_or_else(|| guess_mimetype(path).to_string()),
        visibility: options.visibility.unwrap_or_default(),
        timestamp: now(),
    }
}

fn file_attributes(path: &str, file: &StoredFile) -> FileAttributes {
    FileAttributes::file(path)
        .with_size(file.contents.len() as u64)
        .with_mimetype(file.mimetype.clone())
        .with_timestamp(file.timestamp)
        .with_visibility(file.visibility)
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let path = normalize(path);
        let tree = self.read_tree();
        Ok(tree.files.contains_key(&path) || tree.dir_exists(&path))
    }

    async fn read(&self, path: &str) -> StorageResult<Option<ReadResponse>> {
        let key = normalize(path);
        Ok(self.read_tree().files.get(&key).map(|file| ReadResponse {
            attributes: file_attributes(&key, file),
            contents: file.contents.clone(),
        }))
    }

    async fn read_stream(&self, path: &str) -> StorageResult<Option<StreamResponse>> {
        Ok(self.read(path).await?.map(|response| StreamResponse {
            attributes: response.attributes,
            stream: ContentStream::from_bytes(response.contents),
        }))
    }

    async fn list_contents(
        &self,
        directory: &str,
        recursive: bool,
    ) -> StorageResult<Vec<FileAttributes>> {
        let directory = normalize(directory);
        let prefix = if directory.is_empty() {
            String::new()
        } else {
            format!("{}/", directory)
        };
        let in_scope = |path: &str| {
            path.strip_prefix(&prefix)
                .map(|rel| !rel.is_empty() && (recursive || !rel.contains('/')))
                .unwrap_or(false)
        };

        let tree = self.read_tree();
        let mut entries: Vec<FileAttributes> = tree
            .all_dirs()
            .into_iter()
            .filter(|d| in_scope(d.as_str()))
            .map(FileAttributes::dir)
            .collect();
        entries.extend(
            tree.files
                .iter()
                .filter(|(path, _)| in_scope(path.as_str()))
                .map(|(path, file)| file_attributes(path, file)),
        );
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn get_metadata(&self, path: &str) -> StorageResult<Option<FileAttributes>> {
        let key = normalize(path);
        let tree = self.read_tree();
        if let Some(file) = tree.files.get(&key) {
            return Ok(Some(file_attributes(&key, file)));
        }
        if !key.is_empty() && tree.dir_exists(&key) {
            return Ok(Some(FileAttributes::dir(key)));
        }
        Ok(None)
    }

    async fn get_size(&self, path: &str) -> StorageResult<Option<u64>> {
        Ok(self.file_field(path, |f| f.contents.len() as u64))
    }

    async fn get_mimetype(&self, path: &str) -> StorageResult<Option<String>> {
        Ok(self.file_field(path, |f| f.mimetype.clone()))
    }

    async fn get_timestamp(&self, path: &str) -> StorageResult<Option<i64>> {
        Ok(self.file_field(path, |f| f.timestamp))
    }

    async fn get_visibility(&self, path: &str) -> StorageResult<Option<Visibility>> {
        Ok(self.file_field(path, |f| f.visibility))
    }

    async fn write(
        &self,
        path: &str,
        contents: &[u8],
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        Ok(self.store(path, contents.to_vec(), options))
    }

    async fn write_stream(
        &self,
        path: &str,
        stream: &mut ContentStream,
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        let contents = stream.read_to_end().await?;
        Ok(self.store(path, contents, options))
    }

    async fn update(
        &self,
        path: &str,
        contents: &[u8],
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        self.replace(path, contents.to_vec(), options)
    }

    async fn update_stream(
        &self,
        path: &str,
        stream: &mut ContentStream,
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        let contents = stream.read_to_end().await?;
        self.replace(path, contents, options)
    }

    async fn rename(&self, path: &str, new_path: &str) -> StorageResult<()> {
        let (from, to) = (normalize(path), normalize(new_path));
        let mut tree = self.write_tree();
        if tree.files.contains_key(&to) {
            return Err(StorageError::AlreadyExists {
                path: new_path.to_string(),
            });
        }
        let file = tree.files.remove(&from).ok_or_else(|| not_found(path))?;
        tree.files.insert(to, file);
        Ok(())
    }

    async fn copy(&self, path: &str, new_path: &str) -> StorageResult<()> {
        let (from, to) = (normalize(path), normalize(new_path));
        let mut tree = self.write_tree();
        let mut file = tree.files.get(&from).cloned().ok_or_else(|| not_found(path))?;
        file.timestamp = now();
        tree.files.insert(to, file);
        Ok(())
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        self.write_tree()
            .files
            .remove(&normalize(path))
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    async fn delete_dir(&self, dirname: &str) -> StorageResult<()> {
        let dir = normalize(dirname);
        let mut tree = self.write_tree();
        if tree.files.contains_key(&dir) {
            return Err(StorageError::NotADirectory {
                path: dirname.to_string(),
            });
        }
        if dir.is_empty() || !tree.dir_exists(&dir) {
            return Err(StorageError::backend(dirname, "directory not found"));
        }

        let prefix = format!("{}/", dir);
        tree.files.retain(|path, _| !path.starts_with(&prefix));
        tree.dirs.retain(|d| d != &dir && !d.starts_with(&prefix));
        Ok(())
    }

    async fn create_dir(
        &self,
        dirname: &str,
        _options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        let dir = normalize(dirname);
        let mut tree = self.write_tree();
        if tree.files.contains_key(&dir) {
            return Err(StorageError::AlreadyExists {
                path: dirname.to_string(),
            });
        }
        tree.dirs.insert(dir.clone());
        Ok(FileAttributes::dir(dir))
    }

    async fn set_visibility(
        &self,
        path: &str,
        visibility: Visibility,
    ) -> StorageResult<FileAttributes> {
        let key = normalize(path);
        let mut tree = self.write_tree();
        let file = tree.files.get_mut(&key).ok_or_else(|| not_found(path))?;
        file.visibility = visibility;
        Ok(file_attributes(&key, file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read() {
        let storage = MemoryStorage::new();
        let attrs = storage
            .write("/docs/a.txt", b"hello", &WriteOptions::new())
            .await
            .unwrap();

        assert_eq!(attrs.path, "docs/a.txt");
        assert_eq!(attrs.size, Some(5));
        assert_eq!(attrs.mimetype.as_deref(), Some("text/plain"));

        let read = storage.read("docs/a.txt").await.unwrap().unwrap();
        assert_eq!(read.contents, b"hello");
        assert!(storage.exists("docs").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let storage = MemoryStorage::new();
        assert!(storage.read("nope").await.unwrap().is_none());
        assert!(storage.read_stream("nope").await.unwrap().is_none());
        assert!(storage.get_size("nope").await.unwrap().is_none());
        assert!(storage.delete("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_update_requires_existing_file() {
        let storage = MemoryStorage::new();
        assert!(storage.update("a.txt", b"x", &WriteOptions::new()).await.is_err());

        storage.write("a.txt", b"old", &WriteOptions::new()).await.unwrap();
        let mut stream = ContentStream::from_bytes(b"new".to_vec());
        storage
            .update_stream("a.txt", &mut stream, &WriteOptions::new())
            .await
            .unwrap();
        assert_eq!(storage.contents("a.txt"), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_list_contents() {
        let storage = MemoryStorage::new()
            .with_file("a.txt", b"1".to_vec())
            .with_file("dir/b.txt", b"2".to_vec())
            .with_file("dir/sub/c.txt", b"3".to_vec());

        let top: Vec<String> = storage
            .list_contents("", false)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(top, vec!["a.txt", "dir"]);

        let all: Vec<String> = storage
            .list_contents("dir", true)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(all, vec!["dir/b.txt", "dir/sub", "dir/sub/c.txt"]);
    }

    #[tokio::test]
    async fn test_rename_copy_delete_dir() {
        let storage = MemoryStorage::new().with_file("dir/a.txt", b"x".to_vec());

        storage.copy("dir/a.txt", "dir/b.txt").await.unwrap();
        storage.rename("dir/b.txt", "c.txt").await.unwrap();
        assert_eq!(storage.file_count(), 2);

        assert!(matches!(
            storage.delete_dir("c.txt").await,
            Err(StorageError::NotADirectory { .. })
        ));
        storage.delete_dir("dir").await.unwrap();
        assert_eq!(storage.file_count(), 1);
        assert!(!storage.exists("dir").await.unwrap());
    }

    #[tokio::test]
    async fn test_visibility() {
        let storage = MemoryStorage::new();
        storage
            .write(
                "secret.bin",
                b"k",
                &WriteOptions::new().with_visibility(Visibility::Private),
            )
            .await
            .unwrap();
        assert_eq!(
            storage.get_visibility("secret.bin").await.unwrap(),
            Some(Visibility::Private)
        );

        storage.set_visibility("secret.bin", Visibility::Public).await.unwrap();
        assert_eq!(
            storage.get_visibility("secret.bin").await.unwrap(),
            Some(Visibility::Public)
        );
    }

    #[tokio::test]
    async fn test_create_dir() {
        let storage = MemoryStorage::new();
        let attrs = storage.create_dir("empty/", &WriteOptions::new()).await.unwrap();
        assert!(attrs.is_dir());
        assert_eq!(
            storage.get_metadata("empty").await.unwrap(),
            Some(FileAttributes::dir("empty"))
        );
    }
}
