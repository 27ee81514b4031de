//! Error types for storage operations.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage could not be constructed, or is the inert storage
    /// returned after a failed construction.
    #[error("storage not initialized properly: {0}")]
    Config(String),

    /// The path does not exist.
    #[error("not found: {}", path.display())]
    NotFound {
        /// Absolute path that was looked up.
        path: PathBuf,
    },

    /// The path already exists and the operation required it not to.
    #[error("already exists: {}", path.display())]
    AlreadyExists {
        /// Absolute path that was to be created.
        path: PathBuf,
    },

    /// The OS denied access to the path.
    #[error("permission denied: {}", path.display())]
    PermissionDenied {
        /// Absolute path that was accessed.
        path: PathBuf,
    },

    /// Any other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The encryption key is empty or has the wrong length.
    #[error("invalid key size: expected {expected}, got {actual}")]
    InvalidKey {
        /// Required key length in bytes.
        expected: usize,
        /// Length of the key that was supplied.
        actual: usize,
    },

    /// Ciphertext is shorter than its initialization vector.
    #[error("ciphertext truncated: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum length in bytes.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// A directory record or stored payload is malformed.
    #[error("corrupt data: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// Classifies an I/O error raised while operating on `path`.
    ///
    /// Not-found, already-exists and permission errors become their own
    /// variants carrying the path; everything else stays [`StorageError::Io`].
    pub fn at(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::AlreadyExists => Self::AlreadyExists {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::Io(err),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }

    /// Returns true if this error means the path does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
