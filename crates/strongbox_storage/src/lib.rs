//! # Strongbox Storage
//!
//! Rooted local file storage with optional encryption at rest.
//!
//! A storage is opened over a root directory and offers directory listing
//! and counting, existence checks, and whole-file read, write and append at
//! paths relative to that root. It is meant for services that need simple,
//! safe persistence without running a database.
//!
//! ## Design Principles
//!
//! - Paths are cleaned lexically and can never leave the root
//! - Directory scans decode raw directory records in bulk instead of
//!   looking up metadata per entry
//! - Readers and writers of one file are serialized with OS advisory locks
//! - Encrypted files are `iv || AES-256-CFB(plaintext)`: confidential, but
//!   not authenticated
//! - No cross-file atomicity, indexing or replication
//!
//! ## Available Storages
//!
//! - [`PlainStorage`] - raw bytes on disk
//! - [`EncryptedStorage`] - transparent AES-256-CFB encryption
//! - [`NilStorage`] - fails every call after a failed construction
//! - [`Storage`] - one of the above behind a single type
//!
//! ## Example
//!
//! ```rust
//! use strongbox_storage::{Storage, StorageBackend};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let storage = Storage::encrypted(dir.path(), &[7u8; 32]);
//!
//! storage.append("ledger/2024", b"abc").unwrap();
//! storage.append("ledger/2024", b"def").unwrap();
//! assert_eq!(storage.read_full("ledger/2024").unwrap(), b"abcdef");
//! assert_eq!(storage.count("ledger").unwrap(), 1);
//! ```
//!
//! ## Platform
//!
//! Unix only. The bulk directory reader uses `getdents64` on Linux and
//! `std::fs::read_dir` elsewhere.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod accessor;
mod backend;
mod config;
mod crypto;
mod dirent;
mod encrypted;
mod enumerate;
mod error;
mod nil;
mod plain;
mod root;
mod storage;

pub use accessor::{FileAccessor, FileReader};
pub use backend::StorageBackend;
pub use config::{StorageConfig, DEFAULT_BUFFER_SIZE, MIN_BUFFER_SIZE};
pub use crypto::{decrypt, encrypt, CipherKey, DecryptingReader, IV_SIZE, KEY_SIZE};
pub use dirent::{DirectoryEntry, EntryKind, RecordCursor};
pub use encrypted::EncryptedStorage;
pub use enumerate::DirectoryEnumerator;
pub use error::{StorageError, StorageResult};
pub use nil::NilStorage;
pub use plain::PlainStorage;
pub use root::StorageRoot;
pub use storage::Storage;
