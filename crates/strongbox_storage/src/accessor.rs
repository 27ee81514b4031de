//! Locked file access below a storage root.

use crate::error::{StorageError, StorageResult};
use crate::root::StorageRoot;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::trace;

/// Reads and writes whole files at root-relative paths.
///
/// # Locking
///
/// Readers take a shared advisory lock, writers an exclusive one, each for
/// the duration of the call. Locks are `flock`-style: they serialize every
/// caller that goes through a `FileAccessor` on this machine (including
/// other threads of the same process, since each call opens its own file
/// description) but do nothing against processes that ignore them.
/// Acquisition blocks without a timeout. A crashed holder releases its lock
/// when the process exits.
///
/// # Durability
///
/// With `sync_on_write` set, every write ends with `File::sync_all()`.
#[derive(Debug, Clone)]
pub struct FileAccessor {
    root: StorageRoot,
    sync_on_write: bool,
}

impl FileAccessor {
    /// Creates an accessor for paths below `root`.
    #[must_use]
    pub fn new(root: StorageRoot, sync_on_write: bool) -> Self {
        Self {
            root,
            sync_on_write,
        }
    }

    /// Returns the storage root.
    #[must_use]
    pub fn root(&self) -> &StorageRoot {
        &self.root
    }

    /// Resolves a root-relative path.
    #[must_use]
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.resolve(path)
    }

    /// Returns whether `path` exists.
    ///
    /// # Errors
    ///
    /// Fails only for errors other than "does not exist".
    pub fn exists(&self, path: &str) -> StorageResult<bool> {
        let abs = self.resolve(path);
        match fs::metadata(&abs) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::at(&abs, e)),
        }
    }

    /// Creates an empty file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] if the file is already there.
    pub fn touch(&self, path: &str) -> StorageResult<()> {
        let abs = self.resolve(path);
        create_parent(&abs)?;
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&abs)
            .map_err(|e| StorageError::at(&abs, e))?;
        trace!(path = %abs.display(), "touched file");
        Ok(())
    }

    /// Creates a directory and its parents.
    pub fn mkdir(&self, path: &str) -> StorageResult<()> {
        let abs = self.resolve(path);
        fs::create_dir_all(&abs).map_err(|e| StorageError::at(&abs, e))
    }

    /// Reads a whole file under a shared lock.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the file does not exist.
    pub fn read_full(&self, path: &str) -> StorageResult<Vec<u8>> {
        let abs = self.resolve(path);
        let file = File::open(&abs).map_err(|e| StorageError::at(&abs, e))?;
        let mut locked = LockedFile::shared(file, &abs)?;

        let size = locked
            .file
            .metadata()
            .map_err(|e| StorageError::at(&abs, e))?
            .len();
        let size = usize::try_from(size).map_err(|_| {
            StorageError::corrupt(format!("{} is too large to read", abs.display()))
        })?;

        let mut buf = vec![0u8; size];
        locked
            .file
            .read_exact(&mut buf)
            .map_err(|e| StorageError::at(&abs, e))?;

        trace!(path = %abs.display(), bytes = size, "read file");
        Ok(buf)
    }

    /// Replaces the contents of a file, creating it and its parents if
    /// needed.
    ///
    /// The file is opened without truncation and only rewritten once the
    /// exclusive lock is held, so a concurrent reader never sees it empty.
    pub fn write_truncate(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let abs = self.resolve(path);
        create_parent(&abs)?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&abs)
            .map_err(|e| StorageError::at(&abs, e))?;
        self.replace_locked(file, &abs, data)
    }

    /// Writes a new file, creating its parents if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] if the file is already there.
    pub fn write_exclusive(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let abs = self.resolve(path);
        create_parent(&abs)?;
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&abs)
            .map_err(|e| StorageError::at(&abs, e))?;
        let mut locked = LockedFile::exclusive(file, &abs)?;
        self.write_and_sync(&mut locked, &abs, data)
    }

    /// Replaces the contents of an existing file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the file does not exist.
    pub fn update(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let abs = self.resolve(path);
        let file = OpenOptions::new()
            .write(true)
            .open(&abs)
            .map_err(|e| StorageError::at(&abs, e))?;
        self.replace_locked(file, &abs, data)
    }

    /// Appends to a file, creating it and its parents if needed.
    pub fn append(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let abs = self.resolve(path);
        create_parent(&abs)?;
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&abs)
            .map_err(|e| StorageError::at(&abs, e))?;
        let mut locked = LockedFile::exclusive(file, &abs)?;
        self.write_and_sync(&mut locked, &abs, data)
    }

    /// Runs a read-modify-write cycle under a single exclusive lock.
    ///
    /// `modify` receives the current contents, empty for a missing file, and
    /// returns the replacement. A missing file is only created once `modify`
    /// has succeeded, so a failed call leaves nothing behind. Space for the
    /// replacement is reserved before an existing file is changed, so a full
    /// disk or the file size limit fails the call with the old contents
    /// intact.
    ///
    /// `modify` may run more than once if another writer creates the file
    /// concurrently. Only the result of the last run is written.
    pub fn rewrite_locked<F>(&self, path: &str, mut modify: F) -> StorageResult<()>
    where
        F: FnMut(Vec<u8>) -> StorageResult<Vec<u8>>,
    {
        let abs = self.resolve(path);
        loop {
            let existing = OpenOptions::new().read(true).write(true).open(&abs);
            let (file, fresh) = match existing {
                Ok(file) => (file, None),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    let fresh = modify(Vec::new())?;
                    create_parent(&abs)?;
                    let created = OpenOptions::new()
                        .read(true)
                        .write(true)
                        .create_new(true)
                        .open(&abs);
                    match created {
                        Ok(file) => (file, Some(fresh)),
                        // Lost a creation race; rewrite the winner's file.
                        Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                        Err(e) => return Err(StorageError::at(&abs, e)),
                    }
                }
                Err(e) => return Err(StorageError::at(&abs, e)),
            };

            let mut locked = LockedFile::exclusive(file, &abs)?;
            let mut current = Vec::new();
            locked
                .file
                .read_to_end(&mut current)
                .map_err(|e| StorageError::at(&abs, e))?;

            // Another writer may have filled a file we created before we
            // locked it.
            let replacement = match fresh {
                Some(fresh) if current.is_empty() => fresh,
                _ => modify(current)?,
            };
            return self.overwrite(&mut locked, &abs, &replacement);
        }
    }

    /// Removes a file, or a directory with everything below it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if nothing exists at `path`, and
    /// [`StorageError::PermissionDenied`] for the root itself.
    pub fn delete(&self, path: &str) -> StorageResult<()> {
        let abs = self.resolve(path);
        if abs == self.root.path() {
            return Err(StorageError::PermissionDenied { path: abs });
        }

        let meta = fs::symlink_metadata(&abs).map_err(|e| StorageError::at(&abs, e))?;
        let removed = if meta.is_dir() {
            fs::remove_dir_all(&abs)
        } else {
            fs::remove_file(&abs)
        };
        removed.map_err(|e| StorageError::at(&abs, e))?;

        trace!(path = %abs.display(), "deleted");
        Ok(())
    }

    /// Sets the Unix permission bits of `path`.
    pub fn chmod(&self, path: &str, mode: u32) -> StorageResult<()> {
        use std::os::unix::fs::PermissionsExt;

        let abs = self.resolve(path);
        fs::set_permissions(&abs, fs::Permissions::from_mode(mode))
            .map_err(|e| StorageError::at(&abs, e))
    }

    /// Returns the last modification time of `path`.
    pub fn last_modified(&self, path: &str) -> StorageResult<SystemTime> {
        let abs = self.resolve(path);
        fs::metadata(&abs)
            .and_then(|meta| meta.modified())
            .map_err(|e| StorageError::at(&abs, e))
    }

    /// Opens a streaming reader that holds a shared lock until dropped.
    ///
    /// Writing to the same path from the thread that owns the reader blocks
    /// until the reader is dropped.
    pub fn open_reader(&self, path: &str) -> StorageResult<FileReader> {
        let abs = self.resolve(path);
        let file = File::open(&abs).map_err(|e| StorageError::at(&abs, e))?;
        Ok(FileReader {
            locked: LockedFile::shared(file, &abs)?,
        })
    }

    fn replace_locked(&self, file: File, abs: &Path, data: &[u8]) -> StorageResult<()> {
        let mut locked = LockedFile::exclusive(file, abs)?;
        self.overwrite(&mut locked, abs, data)
    }

    /// Replaces the contents of a locked file.
    ///
    /// Space for `data` is reserved first, so running out of disk space or
    /// hitting the file size limit fails before any byte changes. The data
    /// is then written from the start and the file is cut to its length.
    fn overwrite(&self, locked: &mut LockedFile, abs: &Path, data: &[u8]) -> StorageResult<()> {
        if !data.is_empty() {
            FileExt::allocate(&locked.file, data.len() as u64)
                .map_err(|e| StorageError::at(abs, e))?;
        }
        locked
            .file
            .seek(SeekFrom::Start(0))
            .map_err(|e| StorageError::at(abs, e))?;
        locked
            .file
            .write_all(data)
            .map_err(|e| StorageError::at(abs, e))?;
        locked
            .file
            .set_len(data.len() as u64)
            .map_err(|e| StorageError::at(abs, e))?;
        if self.sync_on_write {
            locked
                .file
                .sync_all()
                .map_err(|e| StorageError::at(abs, e))?;
        }
        trace!(path = %abs.display(), bytes = data.len(), "rewrote file");
        Ok(())
    }

    fn write_and_sync(
        &self,
        locked: &mut LockedFile,
        abs: &Path,
        data: &[u8],
    ) -> StorageResult<()> {
        locked
            .file
            .write_all(data)
            .map_err(|e| StorageError::at(abs, e))?;
        if self.sync_on_write {
            locked
                .file
                .sync_all()
                .map_err(|e| StorageError::at(abs, e))?;
        }
        trace!(path = %abs.display(), bytes = data.len(), "wrote file");
        Ok(())
    }
}

/// Streaming reader over a stored file.
#[derive(Debug)]
pub struct FileReader {
    locked: LockedFile,
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.locked.file.read(buf)
    }
}

/// An open file holding an advisory lock, released on drop.
#[derive(Debug)]
struct LockedFile {
    file: File,
}

impl LockedFile {
    fn exclusive(file: File, path: &Path) -> StorageResult<Self> {
        FileExt::lock_exclusive(&file).map_err(|e| StorageError::at(path, e))?;
        Ok(Self { file })
    }

    fn shared(file: File, path: &Path) -> StorageResult<Self> {
        FileExt::lock_shared(&file).map_err(|e| StorageError::at(path, e))?;
        Ok(Self { file })
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock as well.
        let _ = FileExt::unlock(&self.file);
    }
}

fn create_parent(abs: &Path) -> StorageResult<()> {
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::at(parent, e))?;
    }
    Ok(())
}
