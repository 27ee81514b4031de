//! Storage capability trait.

use crate::error::StorageResult;
use std::io::Read;
use std::time::SystemTime;

/// The operations every storage offers.
///
/// All paths are relative to the storage root and are cleaned before use,
/// so no path can reach outside the root.
///
/// # Invariants
///
/// - `read_full` returns exactly the bytes last written, whatever
///   transformation the storage applies at rest
/// - writers of one file are serialized with an exclusive advisory lock
/// - `list` and `count` are unlocked, best-effort snapshots
/// - implementations are `Send + Sync`
///
/// # Implementors
///
/// - [`crate::PlainStorage`] - raw bytes on disk
/// - [`crate::EncryptedStorage`] - AES-256-CFB at rest
/// - [`crate::NilStorage`] - fails every call
/// - [`crate::Storage`] - dispatches to one of the above
pub trait StorageBackend: Send + Sync {
    /// Returns the names in a directory, sorted ascending or descending.
    fn list(&self, path: &str, ascending: bool) -> StorageResult<Vec<String>>;

    /// Returns the number of regular files in a directory.
    fn count(&self, path: &str) -> StorageResult<usize>;

    /// Returns whether a path exists; absence is not an error.
    fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Creates an empty file; fails if it already exists.
    fn touch(&self, path: &str) -> StorageResult<()>;

    /// Creates a directory and its parents.
    fn mkdir(&self, path: &str) -> StorageResult<()>;

    /// Removes a file or directory subtree; fails if absent.
    fn delete(&self, path: &str) -> StorageResult<()>;

    /// Reads a whole file.
    fn read_full(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Writes a new file; fails if it already exists.
    fn write_exclusive(&self, path: &str, data: &[u8]) -> StorageResult<()>;

    /// Replaces a file's contents, creating it if absent.
    fn write_truncate(&self, path: &str, data: &[u8]) -> StorageResult<()>;

    /// Replaces the contents of an existing file; fails if absent.
    fn update(&self, path: &str, data: &[u8]) -> StorageResult<()>;

    /// Appends to a file, creating it if absent.
    fn append(&self, path: &str, data: &[u8]) -> StorageResult<()>;

    /// Opens a streaming reader over a file's contents.
    fn open_reader(&self, path: &str) -> StorageResult<Box<dyn Read + Send>>;

    /// Sets Unix permission bits.
    fn chmod(&self, path: &str, mode: u32) -> StorageResult<()>;

    /// Returns the last modification time.
    fn last_modified(&self, path: &str) -> StorageResult<SystemTime>;
}
