//! Inert storage returned when construction fails.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use std::io::Read;
use std::time::SystemTime;

/// A storage whose every operation fails with [`StorageError::Config`].
///
/// Handed out by [`crate::Storage::plain`] and [`crate::Storage::encrypted`]
/// when the root or key is unusable, so that misuse after a failed
/// construction is always reported instead of silently reading nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NilStorage {
    reason: String,
}

impl NilStorage {
    /// Creates an inert storage that reports `reason` on every call.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns why the storage could not be constructed.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn fail<T>(&self) -> StorageResult<T> {
        Err(StorageError::Config(self.reason.clone()))
    }
}

impl StorageBackend for NilStorage {
    fn list(&self, _path: &str, _ascending: bool) -> StorageResult<Vec<String>> {
        self.fail()
    }

    fn count(&self, _path: &str) -> StorageResult<usize> {
        self.fail()
    }

    fn exists(&self, _path: &str) -> StorageResult<bool> {
        self.fail()
    }

    fn touch(&self, _path: &str) -> StorageResult<()> {
        self.fail()
    }

    fn mkdir(&self, _path: &str) -> StorageResult<()> {
        self.fail()
    }

    fn delete(&self, _path: &str) -> StorageResult<()> {
        self.fail()
    }

    fn read_full(&self, _path: &str) -> StorageResult<Vec<u8>> {
        self.fail()
    }

    fn write_exclusive(&self, _path: &str, _data: &[u8]) -> StorageResult<()> {
        self.fail()
    }

    fn write_truncate(&self, _path: &str, _data: &[u8]) -> StorageResult<()> {
        self.fail()
    }

    fn update(&self, _path: &str, _data: &[u8]) -> StorageResult<()> {
        self.fail()
    }

    fn append(&self, _path: &str, _data: &[u8]) -> StorageResult<()> {
        self.fail()
    }

    fn open_reader(&self, _path: &str) -> StorageResult<Box<dyn Read + Send>> {
        self.fail()
    }

    fn chmod(&self, _path: &str, _mode: u32) -> StorageResult<()> {
        self.fail()
    }

    fn last_modified(&self, _path: &str) -> StorageResult<SystemTime> {
        self.fail()
    }
}
