//! Raw directory record decoding.
//!
//! The kernel fills the scratch buffer with back-to-back variable-length
//! records in the `linux_dirent64` layout:
//!
//! ```text
//! offset  size  field
//! 0       8     inode (0 = deleted, not yet reclaimed)
//! 8       8     offset of the next record in the directory stream
//! 16      2     record length, header and padding included
//! 18      1     entry type tag (DT_*)
//! 19      ..    name, NUL terminated, padded to 8-byte alignment
//! ```
//!
//! [`RecordCursor`] walks such a buffer with bounds-checked slicing and yields
//! borrowed [`DirectoryEntry`] values; no name is copied.

use crate::error::{StorageError, StorageResult};

const INODE_OFFSET: usize = 0;
const RECLEN_OFFSET: usize = 16;
const TYPE_OFFSET: usize = 18;
/// Offset of the name within a record, which is also the header length.
const NAME_OFFSET: usize = 19;

const DT_UNKNOWN: u8 = 0;
const DT_DIR: u8 = 4;
const DT_REG: u8 = 8;
const DT_LNK: u8 = 10;

/// Kind of a directory entry, as reported by its type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Device, socket, FIFO and anything else.
    Other,
    /// The filesystem did not report a type.
    Unknown,
}

impl EntryKind {
    /// Maps a `DT_*` type tag to a kind.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Self {
        match tag {
            DT_REG => Self::File,
            DT_DIR => Self::Directory,
            DT_LNK => Self::Symlink,
            DT_UNKNOWN => Self::Unknown,
            _ => Self::Other,
        }
    }
}

/// One decoded directory record, borrowing its name from the scratch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry<'a> {
    /// Inode number; zero marks a deleted entry.
    pub inode: u64,
    /// Entry kind from the type tag.
    pub kind: EntryKind,
    /// Name bytes up to (not including) the first NUL.
    pub name: &'a [u8],
}

impl DirectoryEntry<'_> {
    /// Returns false for deleted entries and for `.` and `..`.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.inode != 0 && !matches!(self.name, b"" | b"." | b"..")
    }
}

/// Iterator over the records of one directory read.
///
/// Yields an error and then stops if a record is malformed.
#[derive(Debug)]
pub struct RecordCursor<'a> {
    remaining: &'a [u8],
}

impl<'a> RecordCursor<'a> {
    /// Creates a cursor over the filled part of a scratch buffer.
    #[must_use]
    pub fn new(filled: &'a [u8]) -> Self {
        Self { remaining: filled }
    }

    fn decode(&mut self) -> StorageResult<DirectoryEntry<'a>> {
        let buf = self.remaining;
        if buf.len() < NAME_OFFSET {
            return Err(StorageError::corrupt(format!(
                "directory record header needs {NAME_OFFSET} bytes, {} remain",
                buf.len()
            )));
        }

        let inode = u64::from_ne_bytes(field(buf, INODE_OFFSET)?);
        let reclen = usize::from(u16::from_ne_bytes(field(buf, RECLEN_OFFSET)?));

        if reclen < NAME_OFFSET {
            return Err(StorageError::corrupt(format!(
                "directory record length {reclen} is shorter than its header"
            )));
        }
        if reclen > buf.len() {
            return Err(StorageError::corrupt(format!(
                "directory record length {reclen} exceeds remaining {} bytes",
                buf.len()
            )));
        }

        let kind = EntryKind::from_tag(buf[TYPE_OFFSET]);
        let raw_name = &buf[NAME_OFFSET..reclen];
        let name = match raw_name.iter().position(|&b| b == 0) {
            Some(end) => &raw_name[..end],
            None => raw_name,
        };

        self.remaining = &buf[reclen..];
        Ok(DirectoryEntry { inode, kind, name })
    }
}

impl<'a> Iterator for RecordCursor<'a> {
    type Item = StorageResult<DirectoryEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        let result = self.decode();
        if result.is_err() {
            self.remaining = &[];
        }
        Some(result)
    }
}

fn field<const N: usize>(buf: &[u8], offset: usize) -> StorageResult<[u8; N]> {
    buf.get(offset..offset + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            StorageError::corrupt(format!("directory record field at {offset} out of bounds"))
        })
}
