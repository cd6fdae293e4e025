//! Per-server storage layout.
//!
//! Every server owns `<storage_root>/<server_id>/` holding the compiled build
//! descriptor and the `world/` and `mods/` directories that are bind-mounted
//! into its container.

use std::path::{Path, PathBuf};

use crate::error::{ModdockError, Result};
use crate::types::ServerId;

/// File name of the rendered build descriptor.
pub const DESCRIPTOR_FILE: &str = "Dockerfile";
/// File name of the container entrypoint script.
pub const ENTRYPOINT_FILE: &str = "entrypoint.sh";
/// File name of the rendered game properties.
pub const PROPERTIES_FILE: &str = "server.properties";
/// File name of the operator list.
pub const OPS_FILE: &str = "ops.json";
/// Directory holding world data.
pub const WORLD_DIR: &str = "world";
/// Directory holding mod jars.
pub const MODS_DIR: &str = "mods";

/// Resolves server directories under a storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
    host_root: Option<PathBuf>,
}

impl StorageLayout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            host_root: None,
        }
    }

    /// Sets the path under which the engine host sees the storage root.
    ///
    /// Only needed when this process runs inside a container and shares the
    /// storage root with the engine host through a volume.
    #[must_use]
    pub fn with_host_root(mut self, host_root: impl Into<PathBuf>) -> Self {
        self.host_root = Some(host_root.into());
        self
    }

    /// Returns the storage root as seen by this process.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory owned by a server.
    #[must_use]
    pub fn server_dir(&self, id: &ServerId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Directory owned by a server, as seen by the engine host.
    #[must_use]
    pub fn host_server_dir(&self, id: &ServerId) -> PathBuf {
        self.host_root
            .as_deref()
            .unwrap_or(&self.root)
            .join(id.as_str())
    }

    /// Creates the server directory with its `world/` and `mods/` children.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn ensure_server_dirs(&self, id: &ServerId) -> Result<PathBuf> {
        let dir = self.server_dir(id);
        for sub in [WORLD_DIR, MODS_DIR] {
            let path = dir.join(sub);
            std::fs::create_dir_all(&path).map_err(|e| ModdockError::io(&path, e))?;
        }
        Ok(dir)
    }

    /// Removes a server directory and everything below it.
    ///
    /// A missing directory is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn remove_server_dir(&self, id: &ServerId) -> Result<()> {
        let dir = self.server_dir(id);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ModdockError::io(dir, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_dir_is_keyed_by_id() {
        let layout = StorageLayout::new("/storage/servers");
        let dir = layout.server_dir(&ServerId::new("abc"));
        assert_eq!(dir, PathBuf::from("/storage/servers/abc"));
    }

    #[test]
    fn host_dir_defaults_to_local_root() {
        let layout = StorageLayout::new("/storage");
        let id = ServerId::new("abc");
        assert_eq!(layout.host_server_dir(&id), layout.server_dir(&id));
    }

    #[test]
    fn host_dir_uses_host_root_when_set() {
        let layout = StorageLayout::new("/storage").with_host_root("/srv/moddock");
        let dir = layout.host_server_dir(&ServerId::new("abc"));
        assert_eq!(dir, PathBuf::from("/srv/moddock/abc"));
    }

    #[test]
    fn ensure_and_remove_server_dirs() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let layout = StorageLayout::new(tmp.path());
        let id = ServerId::new("s1");
        let dir = layout.ensure_server_dirs(&id).expect("ensure");
        assert!(dir.join(WORLD_DIR).is_dir());
        assert!(dir.join(MODS_DIR).is_dir());

        layout.remove_server_dir(&id).expect("remove");
        assert!(!dir.exists());
        layout.remove_server_dir(&id).expect("second remove is a no-op");
    }
}
