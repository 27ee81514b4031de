//! The tagged storage facade.

use crate::backend::StorageBackend;
use crate::config::StorageConfig;
use crate::encrypted::EncryptedStorage;
use crate::error::{StorageError, StorageResult};
use crate::nil::NilStorage;
use crate::plain::PlainStorage;
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;
use tracing::warn;

/// A storage of any kind.
///
/// The constructors never fail: if the root or key is unusable they return
/// [`Storage::Nil`], whose every operation reports the construction error.
/// Use [`PlainStorage::open`] or [`EncryptedStorage::open`] directly to get
/// the error up front instead.
#[derive(Debug)]
pub enum Storage {
    /// Raw bytes on disk.
    Plain(PlainStorage),
    /// Encrypted at rest.
    Encrypted(EncryptedStorage),
    /// Construction failed.
    Nil(NilStorage),
}

impl Storage {
    /// Opens a plaintext storage, or a nil storage on failure.
    pub fn plain(root: impl AsRef<Path>) -> Self {
        Self::plain_with_config(root, StorageConfig::default())
    }

    /// Opens a plaintext storage with `config`, or a nil storage on failure.
    pub fn plain_with_config(root: impl AsRef<Path>, config: StorageConfig) -> Self {
        or_nil(PlainStorage::with_config(root, config), Self::Plain)
    }

    /// Opens an encrypted storage, or a nil storage on failure.
    pub fn encrypted(root: impl AsRef<Path>, key: &[u8]) -> Self {
        Self::encrypted_with_config(root, key, StorageConfig::default())
    }

    /// Opens an encrypted storage with `config`, or a nil storage on failure.
    pub fn encrypted_with_config(
        root: impl AsRef<Path>,
        key: &[u8],
        config: StorageConfig,
    ) -> Self {
        or_nil(
            EncryptedStorage::with_config(root, key, config),
            Self::Encrypted,
        )
    }

    /// Returns true if construction failed.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil(_))
    }

    fn backend(&self) -> &dyn StorageBackend {
        match self {
            Self::Plain(storage) => storage,
            Self::Encrypted(storage) => storage,
            Self::Nil(storage) => storage,
        }
    }
}

fn or_nil<S>(opened: StorageResult<S>, wrap: fn(S) -> Storage) -> Storage {
    match opened {
        Ok(storage) => wrap(storage),
        Err(err) => {
            warn!(error = %err, "storage construction failed, every call will fail");
            let reason = match err {
                StorageError::Config(reason) => reason,
                other => other.to_string(),
            };
            Storage::Nil(NilStorage::new(reason))
        }
    }
}

impl From<PlainStorage> for Storage {
    fn from(storage: PlainStorage) -> Self {
        Self::Plain(storage)
    }
}

impl From<EncryptedStorage> for Storage {
    fn from(storage: EncryptedStorage) -> Self {
        Self::Encrypted(storage)
    }
}

impl From<NilStorage> for Storage {
    fn from(storage: NilStorage) -> Self {
        Self::Nil(storage)
    }
}

impl StorageBackend for Storage {
    fn list(&self, path: &str, ascending: bool) -> StorageResult<Vec<String>> {
        self.backend().list(path, ascending)
    }

    fn count(&self, path: &str) -> StorageResult<usize> {
        self.backend().count(path)
    }

    fn exists(&self, path: &str) -> StorageResult<bool> {
        self.backend().exists(path)
    }

    fn touch(&self, path: &str) -> StorageResult<()> {
        self.backend().touch(path)
    }

    fn mkdir(&self, path: &str) -> StorageResult<()> {
        self.backend().mkdir(path)
    }

    fn delete(&self, path: &str) -> StorageResult<()> {
        self.backend().delete(path)
    }

    fn read_full(&self, path: &str) -> StorageResult<Vec<u8>> {
        self.backend().read_full(path)
    }

    fn write_exclusive(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        self.backend().write_exclusive(path, data)
    }

    fn write_truncate(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        self.backend().write_truncate(path, data)
    }

    fn update(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        self.backend().update(path, data)
    }

    fn append(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        self.backend().append(path, data)
    }

    fn open_reader(&self, path: &str) -> StorageResult<Box<dyn Read + Send>> {
        self.backend().open_reader(path)
    }

    fn chmod(&self, path: &str, mode: u32) -> StorageResult<()> {
        self.backend().chmod(path, mode)
    }

    fn last_modified(&self, path: &str) -> StorageResult<SystemTime> {
        self.backend().last_modified(path)
    }
}
