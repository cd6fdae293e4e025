//! Per-server serialization of pipeline operations.
//!
//! Two layers: an async mutex per server orders tasks inside one process,
//! and an advisory lock file per server orders separate processes, such as
//! two `mdk` invocations started at once.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use moddock_common::error::{ModdockError, Result};
use moddock_common::filelock::FileLock;
use moddock_common::types::ServerId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Exclusive access to one server, released on drop.
#[derive(Debug)]
pub struct ServerGuard {
    _file: FileLock,
    _local: OwnedMutexGuard<()>,
}

/// One lock per server id.
///
/// Holding the guard for a server excludes every other pipeline operation
/// on that server, in this process or any other sharing the lock directory;
/// operations on different servers never contend.
#[derive(Debug)]
pub struct ServerLocks {
    dir: PathBuf,
    locks: Mutex<HashMap<ServerId, Arc<AsyncMutex<()>>>>,
}

impl ServerLocks {
    /// Creates an empty lock map keeping its lock files in `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::default(),
        }
    }

    /// Waits for exclusive access to `server_id`.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the lock file cannot be created or locked.
    pub async fn acquire(&self, server_id: &ServerId) -> Result<ServerGuard> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(server_id.clone()).or_default())
        };
        let local = lock.lock_owned().await;

        let path = self.dir.join(format!("{server_id}.lock"));
        let file = tokio::task::spawn_blocking({
            let path = path.clone();
            move || FileLock::acquire(path)
        })
        .await
        .map_err(|e| ModdockError::io(&path, std::io::Error::other(e)))??;
        Ok(ServerGuard {
            _file: file,
            _local: local,
        })
    }

    /// Drops the in-process lock entry of a deleted server.
    ///
    /// Waiters already holding a clone of the lock are unaffected. The lock
    /// file stays on disk.
    pub fn forget(&self, server_id: &ServerId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = locks.remove(server_id);
    }

    /// Number of servers with a lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no server has a lock entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_server_is_exclusive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let locks = ServerLocks::new(dir.path());
        let id = ServerId::new("s1");
        let guard = locks.acquire(&id).await.expect("lock");
        let blocked = tokio::time::timeout(Duration::from_millis(20), locks.acquire(&id)).await;
        assert!(blocked.is_err());
        drop(guard);
        let _again = locks.acquire(&id).await.expect("lock");
    }

    #[tokio::test]
    async fn different_servers_do_not_contend() {
        let dir = tempfile::tempdir().expect("tempdir");
        let locks = ServerLocks::new(dir.path());
        let _a = locks.acquire(&ServerId::new("a")).await.expect("lock");
        let b = tokio::time::timeout(Duration::from_secs(5), locks.acquire(&ServerId::new("b"))).await;
        assert!(matches!(b, Ok(Ok(_))));
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn separate_lock_maps_exclude_each_other() {
        // Two maps over one directory stand in for two processes.
        let dir = tempfile::tempdir().expect("tempdir");
        let first = ServerLocks::new(dir.path());
        let second = ServerLocks::new(dir.path());
        let id = ServerId::new("s1");

        let guard = first.acquire(&id).await.expect("lock");
        assert!(dir.path().join("s1.lock").exists());
        let blocked = tokio::time::timeout(Duration::from_millis(100), second.acquire(&id)).await;
        assert!(blocked.is_err());

        drop(guard);
        let taken = tokio::time::timeout(Duration::from_secs(5), second.acquire(&id)).await;
        assert!(matches!(taken, Ok(Ok(_))));
    }

    #[tokio::test]
    async fn forget_removes_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let locks = ServerLocks::new(dir.path());
        let id = ServerId::new("s1");
        drop(locks.acquire(&id).await.expect("lock"));
        locks.forget(&id);
        assert!(locks.is_empty());
    }
}
