//! Advisory file locks shared between Moddock processes.
//!
//! Every `mdk` invocation is its own process, so in-memory locks only cover
//! one run. A [`FileLock`] holds an exclusive `flock(2)` on a lock file and
//! releases it on drop, which also happens when the process dies.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};

use crate::error::{ModdockError, Result};

/// Exclusive advisory lock on a file, held until dropped.
pub struct FileLock {
    path: PathBuf,
    _flock: Flock<File>,
}

impl FileLock {
    /// Blocks until the exclusive lock on `path` is held.
    ///
    /// The file and its parent directory are created when missing. Lock
    /// files are never deleted: unlinking one while another process waits
    /// on it would let two holders lock different inodes.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be opened or locked.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ModdockError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| ModdockError::io(&path, e))?;
        let flock = Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| ModdockError::io(&path, errno.into()))?;
        tracing::trace!(path = %path.display(), "file lock acquired");
        Ok(Self {
            path,
            _flock: flock,
        })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for FileLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLock").field("path", &self.path).finish()
    }
}
