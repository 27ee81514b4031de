//! Encrypted storage.
//!
//! Every file is stored as `iv (16 bytes) || AES-256-CFB(plaintext)` at the
//! same location a [`crate::PlainStorage`] would use. There is no header or
//! magic number, so an encrypted file cannot be told apart from arbitrary
//! binary data.
//!
//! ## Appending
//!
//! A stream cipher keyed with a fresh IV per file cannot simply be extended
//! at the end, so [`append`](StorageBackend::append) reads the whole file,
//! decrypts it, adds the new bytes and re-encrypts everything under a new IV.
//! The cost is proportional to the existing file size. The whole cycle runs
//! under one exclusive lock, so concurrent appends cannot interleave their
//! reads and writes and lose data.

use crate::accessor::FileAccessor;
use crate::backend::StorageBackend;
use crate::config::StorageConfig;
use crate::crypto::{CipherKey, DecryptingReader};
use crate::enumerate::DirectoryEnumerator;
use crate::error::{StorageError, StorageResult};
use crate::root::StorageRoot;
use parking_lot::RwLock;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Storage that encrypts file contents at rest.
///
/// # Example
///
/// ```no_run
/// use strongbox_storage::{EncryptedStorage, StorageBackend};
///
/// let key = [0x42u8; 32];
/// let storage = EncryptedStorage::open("/var/lib/app", &key).unwrap();
/// storage.append("journal", b"abc").unwrap();
/// storage.append("journal", b"def").unwrap();
/// assert_eq!(storage.read_full("journal").unwrap(), b"abcdef");
/// ```
#[derive(Debug)]
pub struct EncryptedStorage {
    files: FileAccessor,
    dirs: DirectoryEnumerator,
    key: RwLock<Arc<CipherKey>>,
}

impl EncryptedStorage {
    /// Opens an encrypted storage over `root` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Config`] if the key is empty or not 32 bytes,
    /// or if the root cannot be asserted.
    pub fn open(root: impl AsRef<Path>, key: &[u8]) -> StorageResult<Self> {
        Self::with_config(root, key, StorageConfig::default())
    }

    /// Opens an encrypted storage over `root` with a raw key.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open), plus invalid configuration.
    pub fn with_config(
        root: impl AsRef<Path>,
        key: &[u8],
        config: StorageConfig,
    ) -> StorageResult<Self> {
        let key = CipherKey::from_bytes(key)
            .map_err(|e| StorageError::config(format!("no encryption key setup: {e}")))?;
        Self::with_key(root, key, config)
    }

    /// Opens an encrypted storage over `root` with a typed key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Config`] if the configuration is invalid or
    /// the root cannot be asserted.
    pub fn with_key(
        root: impl AsRef<Path>,
        key: CipherKey,
        config: StorageConfig,
    ) -> StorageResult<Self> {
        config.validate()?;
        let root = StorageRoot::open(root, config.create_root)?;
        debug!(
            root = %root.path().display(),
            buffer_size = config.buffer_size,
            "opened encrypted storage"
        );
        Ok(Self {
            files: FileAccessor::new(root, config.sync_on_write),
            dirs: DirectoryEnumerator::new(config.buffer_size),
            key: RwLock::new(Arc::new(key)),
        })
    }

    /// Returns the absolute root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.files.root().path()
    }

    /// Replaces the encryption key.
    ///
    /// The swap is atomic: operations already running finish with the key
    /// they started with, later ones use the new key. Existing files are
    /// not re-encrypted.
    pub fn rotate_key(&self, key: CipherKey) {
        *self.key.write() = Arc::new(key);
        debug!(root = %self.root().display(), "rotated encryption key");
    }

    fn key(&self) -> Arc<CipherKey> {
        Arc::clone(&self.key.read())
    }
}

impl StorageBackend for EncryptedStorage {
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
        let ciphertext = self.files.read_full(path)?;
        self.key().decrypt_in_place(ciphertext)
    }

    fn write_exclusive(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let ciphertext = self.key().encrypt(data)?;
        self.files.write_exclusive(path, &ciphertext)
    }

    fn write_truncate(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let ciphertext = self.key().encrypt(data)?;
        self.files.write_truncate(path, &ciphertext)
    }

    fn update(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let ciphertext = self.key().encrypt(data)?;
        self.files.update(path, &ciphertext)
    }

    fn append(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let key = self.key();
        self.files.rewrite_locked(path, |existing| {
            // A missing or freshly touched file holds no ciphertext yet.
            let mut plaintext = if existing.is_empty() {
                Vec::with_capacity(data.len())
            } else {
                key.decrypt_in_place(existing)?
            };
            plaintext.extend_from_slice(data);
            key.encrypt(&plaintext)
        })
    }

    fn open_reader(&self, path: &str) -> StorageResult<Box<dyn Read + Send>> {
        let file = self.files.open_reader(path)?;
        Ok(Box::new(DecryptingReader::new(&self.key(), file)?))
    }

    fn chmod(&self, path: &str, mode: u32) -> StorageResult<()> {
        self.files.chmod(path, mode)
    }

    fn last_modified(&self, path: &str) -> StorageResult<SystemTime> {
        self.files.last_modified(path)
    }
}
