//! Storage root directory and root-relative path resolution.

use crate::error::{StorageError, StorageResult};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// The base directory every storage operation is confined to.
///
/// Relative paths are cleaned lexically before they are joined to the root:
/// `.` components are dropped, `..` removes the previous component but never
/// climbs above the root, and a leading `/` is ignored. The result always
/// lies inside the root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRoot {
    path: PathBuf,
}

impl StorageRoot {
    /// Asserts the root directory, creating it first if `create` is set.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Config`] if the path is empty, cannot be
    /// created, or is not a directory.
    pub fn open(path: impl AsRef<Path>, create: bool) -> StorageResult<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(StorageError::config("root path is empty"));
        }

        let absolute = std::path::absolute(path).map_err(|e| {
            StorageError::config(format!("unable to resolve root {}: {e}", path.display()))
        })?;

        if create {
            fs::create_dir_all(&absolute).map_err(|e| {
                StorageError::config(format!(
                    "unable to assert root storage directory {}: {e}",
                    absolute.display()
                ))
            })?;
        }

        match fs::metadata(&absolute) {
            Ok(meta) if meta.is_dir() => Ok(Self { path: absolute }),
            Ok(_) => Err(StorageError::config(format!(
                "root is not a directory: {}",
                absolute.display()
            ))),
            Err(e) => Err(StorageError::config(format!(
                "unable to assert root storage directory {}: {e}",
                absolute.display()
            ))),
        }
    }

    /// Returns the absolute root path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves a root-relative path to an absolute path inside the root.
    #[must_use]
    pub fn resolve(&self, relative: &str) -> PathBuf {
        let mut resolved = self.path.clone();
        let mut depth = 0usize;

        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::ParentDir => {
                    if depth > 0 {
                        resolved.pop();
                        depth -= 1;
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }

        resolved
    }
}
