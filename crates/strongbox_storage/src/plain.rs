//! Plaintext storage.

use crate::accessor::FileAccessor;
use crate::backend::StorageBackend;
use crate::config::StorageConfig;
use crate::enumerate::DirectoryEnumerator;
use crate::error::StorageResult;
use crate::root::StorageRoot;
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

/// Storage that keeps file contents as raw bytes.
///
/// # Example
///
/// ```no_run
/// use strongbox_storage::{PlainStorage, StorageBackend};
///
/// let storage = PlainStorage::open("/var/lib/app").unwrap();
/// storage.write_truncate("accounts/alice", b"balance=10").unwrap();
/// assert_eq!(storage.read_full("accounts/alice").unwrap(), b"balance=10");
/// ```
#[derive(Debug, Clone)]
pub struct PlainStorage {
    files: FileAccessor,
    dirs: DirectoryEnumerator,
}

impl PlainStorage {
    /// Opens a storage over `root` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::Config`] if the root cannot be asserted.
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        Self::with_config(root, StorageConfig::default())
    }

    /// Opens a storage over `root`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::Config`] if the configuration is invalid
    /// or the root cannot be asserted.
    pub fn with_config(root: impl AsRef<Path>, config: StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        let root = StorageRoot::open(root, config.create_root)?;
        debug!(
            root = %root.path().display(),
            buffer_size = config.buffer_size,
            "opened plain storage"
        );
        Ok(Self {
            files: FileAccessor::new(root, config.sync_on_write),
            dirs: DirectoryEnumerator::new(config.buffer_size),
        })
    }

    /// Returns the absolute root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.files.root().path()
    }
}

impl StorageBackend for PlainStorage {
    fn list(&self, path: &str, ascending: bool) -> StorageResult<Vec<String>> {
        self.dirs.list(&self.files.resolve(path), ascending)
    }

    fn count(&self, path: &str) -> StorageResult<usize> {
        self.dirs.count(&self.files.resolve(path))
    }

    fn exists(&self, path: &str) -> StorageResult<bool> {
        self.files.exists(path)
    }

    fn touch(&self, path: &str) -> StorageResult<()> {
        self.files.touch(path)
    }

    fn mkdir(&self, path: &str) -> StorageResult<()> {
        self.files.mkdir(path)
    }

    fn delete(&self, path: &str) -> StorageResult<()> {
        self.files.delete(path)
    }

    fn read_full(&self, path: &str) -> StorageResult<Vec<u8>> {
        self.files.read_full(path)
    }

    fn write_exclusive(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        self.files.write_exclusive(path, data)
    }

    fn write_truncate(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        self.files.write_truncate(path, data)
    }

    fn update(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        self.files.update(path, data)
    }

    fn append(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        self.files.append(path, data)
    }

    fn open_reader(&self, path: &str) -> StorageResult<Box<dyn Read + Send>> {
        Ok(Box::new(self.files.open_reader(path)?))
    }

    fn chmod(&self, path: &str, mode: u32) -> StorageResult<()> {
        self.files.chmod(path, mode)
    }

    fn last_modified(&self, path: &str) -> StorageResult<SystemTime> {
        self.files.last_modified(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn open_creates_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");

        let storage = PlainStorage::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(storage.root(), root);
    }

    #[test]
    fn open_rejects_bad_config() {
        let dir = tempdir().unwrap();
        let result = PlainStorage::with_config(dir.path(), StorageConfig::new().buffer_size(16));
        assert!(matches!(result, Err(StorageError::Config(_))));

        let result = PlainStorage::with_config(
            dir.path().join("missing"),
            StorageConfig::new().create_root(false),
        );
        assert!(matches!(result, Err(StorageError::Config(_))));
    }

    #[test]
    fn bytes_are_stored_verbatim() {
        let dir = tempdir().unwrap();
        let storage = PlainStorage::open(dir.path()).unwrap();

        storage.write_truncate("raw", b"visible").unwrap();
        assert_eq!(fs::read(dir.path().join("raw")).unwrap(), b"visible");
    }

    #[test]
    fn list_and_count_are_root_relative() {
        let dir = tempdir().unwrap();
        let storage = PlainStorage::open(dir.path()).unwrap();

        storage.touch("box/b").unwrap();
        storage.touch("box/a").unwrap();
        storage.mkdir("box/sub").unwrap();

        assert_eq!(storage.list("box", true).unwrap(), vec!["a", "b", "sub"]);
        assert_eq!(storage.count("box").unwrap(), 2);
    }

    #[test]
    fn reader_returns_raw_bytes() {
        let dir = tempdir().unwrap();
        let storage = PlainStorage::open(dir.path()).unwrap();
        storage.write_truncate("r", b"reader data").unwrap();

        let mut out = Vec::new();
        storage
            .open_reader("r")
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"reader data");
    }
}
