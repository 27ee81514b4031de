//! Directory listing and counting.
//!
//! On Linux the directory stream is read in bulk with `getdents64` into a
//! per-call scratch buffer and decoded with [`RecordCursor`], so neither
//! listing nor counting issues a metadata lookup per entry. Other Unix
//! targets go through `std::fs::read_dir`, which gives the same result
//! without the bulk decoding.
//!
//! Neither operation takes a lock. Entries created or removed while a scan
//! is running may or may not show up in its result.

use crate::dirent::{DirectoryEntry, EntryKind};
use crate::error::{StorageError, StorageResult};
use std::path::Path;
use tracing::trace;

#[cfg(target_os = "linux")]
use crate::dirent::RecordCursor;

/// Lists and counts directory entries.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryEnumerator {
    buffer_size: usize,
}

impl DirectoryEnumerator {
    /// Creates an enumerator whose scans use a scratch buffer of
    /// `buffer_size` bytes.
    #[must_use]
    pub const fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    /// Returns the scratch buffer size.
    #[must_use]
    pub const fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Returns the names in `dir`, sorted ascending or descending.
    ///
    /// `.` and `..` are never included.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the directory does not exist,
    /// [`StorageError::PermissionDenied`] if it cannot be opened, and
    /// [`StorageError::Corrupt`] if the kernel returns a malformed record.
    pub fn list(&self, dir: &Path, ascending: bool) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        self.scan(dir, |entry| {
            names.push(String::from_utf8_lossy(entry.name).into_owned());
            Ok(())
        })?;

        if ascending {
            names.sort_unstable();
        } else {
            names.sort_unstable_by(|a, b| b.cmp(a));
        }

        trace!(dir = %dir.display(), entries = names.len(), "listed directory");
        Ok(names)
    }

    /// Returns the number of regular files in `dir`.
    ///
    /// Directories, symlinks and special files are skipped.
    ///
    /// # Errors
    ///
    /// Same as [`list`](Self::list).
    pub fn count(&self, dir: &Path) -> StorageResult<usize> {
        let mut files = 0usize;
        self.scan(dir, |entry| {
            if is_regular_file(dir, &entry)? {
                files += 1;
            }
            Ok(())
        })?;

        trace!(dir = %dir.display(), files, "counted directory");
        Ok(files)
    }

    #[cfg(target_os = "linux")]
    fn scan<F>(&self, dir: &Path, mut visit: F) -> StorageResult<()>
    where
        F: FnMut(DirectoryEntry<'_>) -> StorageResult<()>,
    {
        let handle = std::fs::File::open(dir).map_err(|e| StorageError::at(dir, e))?;
        let mut scratch = vec![0u8; self.buffer_size];

        loop {
            let filled =
                sys::read_dir_records(&handle, &mut scratch).map_err(|e| StorageError::at(dir, e))?;
            if filled == 0 {
                break;
            }

            for entry in RecordCursor::new(&scratch[..filled]) {
                let entry = entry?;
                if entry.is_visible() {
                    visit(entry)?;
                }
            }
        }

        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn scan<F>(&self, dir: &Path, mut visit: F) -> StorageResult<()>
    where
        F: FnMut(DirectoryEntry<'_>) -> StorageResult<()>,
    {
        use std::os::unix::fs::DirEntryExt;

        for entry in std::fs::read_dir(dir).map_err(|e| StorageError::at(dir, e))? {
            let entry = entry.map_err(|e| StorageError::at(dir, e))?;
            let file_type = entry.file_type().map_err(|e| StorageError::at(dir, e))?;
            let kind = if file_type.is_file() {
                EntryKind::File
            } else if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_symlink() {
                EntryKind::Symlink
            } else {
                EntryKind::Other
            };
            let name = entry.file_name();
            let entry = DirectoryEntry {
                inode: entry.ino(),
                kind,
                name: name.as_encoded_bytes(),
            };
            if entry.is_visible() {
                visit(entry)?;
            }
        }

        Ok(())
    }
}

/// Decides whether an entry is a regular file, falling back to one
/// `lstat` when the filesystem left the type tag empty.
fn is_regular_file(dir: &Path, entry: &DirectoryEntry<'_>) -> StorageResult<bool> {
    match entry.kind {
        EntryKind::File => Ok(true),
        EntryKind::Unknown => {
            use std::os::unix::ffi::OsStrExt;

            let path = dir.join(std::ffi::OsStr::from_bytes(entry.name));
            match std::fs::symlink_metadata(&path) {
                Ok(meta) => Ok(meta.file_type().is_file()),
                // Removed since the directory was read.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(StorageError::at(&path, e)),
            }
        }
        _ => Ok(false),
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::fd::AsRawFd;

    /// Reads the next batch of `linux_dirent64` records from `dir` into
    /// `buf`. Returns the number of bytes filled, zero at end of stream.
    #[allow(unsafe_code)]
    pub(super) fn read_dir_records(dir: &File, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: `buf` is an exclusively borrowed allocation of exactly
        // `buf.len()` writable bytes, and `dir` keeps the descriptor open
        // for the duration of the call.
        let filled = unsafe {
            libc::syscall(
                libc::SYS_getdents64,
                dir.as_raw_fd(),
                buf.as_mut_ptr(),
                buf.len(),
            )
        };
        if filled < 0 {
            return Err(io::Error::last_os_error());
        }
        usize::try_from(filled).map_err(|_| io::Error::new(io::ErrorKind::Other, "negative read"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_BUFFER_SIZE, MIN_BUFFER_SIZE};
    use std::fs;
    use tempfile::tempdir;

    fn pad(i: usize) -> String {
        format!("{i:010}")
    }

    #[test]
    fn list_sorts_ascending_and_descending() {
        let dir = tempdir().unwrap();
        for i in [3, 0, 10, 7, 1] {
            fs::File::create(dir.path().join(pad(i))).unwrap();
        }
        let enumerator = DirectoryEnumerator::new(DEFAULT_BUFFER_SIZE);

        let ascending = enumerator.list(dir.path(), true).unwrap();
        assert_eq!(ascending, vec![pad(0), pad(1), pad(3), pad(7), pad(10)]);

        let descending = enumerator.list(dir.path(), false).unwrap();
        assert_eq!(descending, vec![pad(10), pad(7), pad(3), pad(1), pad(0)]);
    }

    #[test]
    fn list_includes_directories_and_hides_dots() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::File::create(dir.path().join(".hidden")).unwrap();

        let names = DirectoryEnumerator::new(DEFAULT_BUFFER_SIZE)
            .list(dir.path(), true)
            .unwrap();
        assert_eq!(names, vec![".hidden".to_string(), "sub".to_string()]);
    }

    #[test]
    fn list_empty_directory() {
        let dir = tempdir().unwrap();
        let enumerator = DirectoryEnumerator::new(DEFAULT_BUFFER_SIZE);
        assert!(enumerator.list(dir.path(), true).unwrap().is_empty());
        assert_eq!(enumerator.count(dir.path()).unwrap(), 0);
    }

    #[test]
    fn small_buffer_needs_several_reads() {
        let dir = tempdir().unwrap();
        for i in 0..400 {
            fs::File::create(dir.path().join(format!("entry-with-a-longish-name-{i:05}"))).unwrap();
        }
        let enumerator = DirectoryEnumerator::new(MIN_BUFFER_SIZE);

        let names = enumerator.list(dir.path(), true).unwrap();
        assert_eq!(names.len(), 400);
        assert_eq!(names[0], "entry-with-a-longish-name-00000");
        assert_eq!(names[399], "entry-with-a-longish-name-00399");
        assert_eq!(enumerator.count(dir.path()).unwrap(), 400);
    }

    #[test]
    fn count_skips_directories_and_symlinks() {
        let dir = tempdir().unwrap();
        for i in 0..5 {
            fs::File::create(dir.path().join(format!("{}F", pad(i)))).unwrap();
        }
        for i in 0..3 {
            fs::create_dir(dir.path().join(format!("{}D", pad(i)))).unwrap();
        }
        std::os::unix::fs::symlink(
            dir.path().join(format!("{}F", pad(0))),
            dir.path().join("link"),
        )
        .unwrap();

        let count = DirectoryEnumerator::new(DEFAULT_BUFFER_SIZE)
            .count(dir.path())
            .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn missing_directory_is_not_found() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let enumerator = DirectoryEnumerator::new(DEFAULT_BUFFER_SIZE);

        assert!(matches!(
            enumerator.list(&missing, true),
            Err(StorageError::NotFound { .. })
        ));
        assert!(matches!(
            enumerator.count(&missing),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn regular_file_is_not_a_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"data").unwrap();

        assert!(DirectoryEnumerator::new(DEFAULT_BUFFER_SIZE)
            .list(&file, true)
            .is_err());
    }

    #[test]
    fn unknown_kind_resolved_by_lstat() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("file"), b"x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let entry = |name: &'static [u8]| DirectoryEntry {
            inode: 1,
            kind: EntryKind::Unknown,
            name,
        };
        assert!(is_regular_file(dir.path(), &entry(b"file")).unwrap());
        assert!(!is_regular_file(dir.path(), &entry(b"sub")).unwrap());
        assert!(!is_regular_file(dir.path(), &entry(b"vanished")).unwrap());
    }

    #[test]
    fn unreadable_directory_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::File::create(locked.join("inside")).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores permission bits.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let enumerator = DirectoryEnumerator::new(DEFAULT_BUFFER_SIZE);
        let listed = enumerator.list(&locked, true);
        let counted = enumerator.count(&locked);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(listed, Err(StorageError::PermissionDenied { .. })));
        assert!(matches!(counted, Err(StorageError::PermissionDenied { .. })));
    }
}
