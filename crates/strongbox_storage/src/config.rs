//! Storage configuration.

use crate::error::{StorageError, StorageResult};

/// Default size of the directory-read scratch buffer (8 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Smallest scratch buffer accepted. A single directory record can be close
/// to 280 bytes, so anything much smaller risks `EINVAL` from the kernel.
pub const MIN_BUFFER_SIZE: usize = 1024;

/// Configuration for opening a storage.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Size of the scratch buffer used for each directory scan.
    pub buffer_size: usize,

    /// Whether to create the root directory if it doesn't exist.
    pub create_root: bool,

    /// Whether to `fsync` files after every write.
    pub sync_on_write: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            create_root: true,
            sync_on_write: true,
        }
    }
}

impl StorageConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory scan buffer size.
    #[must_use]
    pub const fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Sets whether to create the root directory if missing.
    #[must_use]
    pub const fn create_root(mut self, value: bool) -> Self {
        self.create_root = value;
        self
    }

    /// Sets whether to sync files on every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Config`] if the buffer size is below
    /// [`MIN_BUFFER_SIZE`].
    pub fn validate(&self) -> StorageResult<()> {
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(StorageError::config(format!(
                "buffer size {} is below minimum {MIN_BUFFER_SIZE}",
                self.buffer_size
            )));
        }
        Ok(())
    }
}
