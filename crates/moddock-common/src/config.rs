//! Global configuration model for Moddock.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{ModdockError, Result};
use crate::storage::StorageLayout;

/// How the version selector breaks ties between compatible versions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// First compatible version in registry response order.
    #[default]
    RegistryOrder,
    /// Most recently published compatible version.
    NewestPublished,
}

/// Root configuration for Moddock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModdockConfig {
    /// Base directory for Moddock state.
    pub data_dir: PathBuf,
    /// Root of the per-server storage directories.
    pub storage_root: PathBuf,
    /// Storage root as seen by the container engine host, if different.
    pub host_storage_root: Option<PathBuf>,
    /// Container engine endpoint (`unix:///var/run/docker.sock`,
    /// `tcp://host:2375`). Local defaults when absent.
    pub engine_endpoint: Option<String>,
    /// Base URL of the mod registry.
    pub registry_url: String,
    /// Registry request budget per minute.
    pub registry_requests_per_minute: u32,
    /// Registry burst size.
    pub registry_burst: u32,
    /// Timeout for one external request, in seconds.
    pub request_timeout_secs: u64,
    /// Version tie-break policy.
    pub selection_policy: SelectionPolicy,
}

impl Default for ModdockConfig {
    fn default() -> Self {
        let data_dir = constants::data_dir().clone();
        Self {
            storage_root: data_dir.join("servers"),
            data_dir,
            host_storage_root: None,
            engine_endpoint: None,
            registry_url: constants::DEFAULT_REGISTRY_URL.to_string(),
            registry_requests_per_minute: constants::DEFAULT_REGISTRY_REQUESTS_PER_MINUTE,
            registry_burst: constants::DEFAULT_REGISTRY_BURST,
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT_SECS,
            selection_policy: SelectionPolicy::default(),
        }
    }
}

impl ModdockConfig {
    /// Loads configuration from a JSON file.
    ///
    /// A missing file yields the defaults; fields absent from the file keep
    /// their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the loaded values are invalid.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ModdockError::io(path, e))?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ModdockError::Config` if the registry budget is zero.
    pub fn validate(&self) -> Result<()> {
        if self.registry_requests_per_minute == 0 || self.registry_burst == 0 {
            return Err(ModdockError::Config {
                message: "registry budget and burst must be positive".into(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ModdockError::Config {
                message: "request timeout must be positive".into(),
            });
        }
        Ok(())
    }

    /// Returns the path of the store file.
    #[must_use]
    pub fn store_file(&self) -> PathBuf {
        self.data_dir.join(constants::STORE_FILE)
    }

    /// Returns the directory holding per-server lock files.
    #[must_use]
    pub fn locks_dir(&self) -> PathBuf {
        self.data_dir.join(constants::LOCKS_DIR)
    }

    /// Builds the storage layout described by this configuration.
    #[must_use]
    pub fn storage_layout(&self) -> StorageLayout {
        let layout = StorageLayout::new(&self.storage_root);
        match &self.host_storage_root {
            Some(host) => layout.with_host_root(host),
            None => layout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ModdockConfig::load(&dir.path().join("absent.json")).expect("load");
        assert_eq!(config.registry_url, constants::DEFAULT_REGISTRY_URL);
        assert_eq!(config.selection_policy, SelectionPolicy::RegistryOrder);
    }

    #[test]
    fn load_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"storage_root": "/srv/servers", "selection_policy": "newest_published"}"#,
        )
        .expect("write");

        let config = ModdockConfig::load(&path).expect("load");
        assert_eq!(config.storage_root, PathBuf::from("/srv/servers"));
        assert_eq!(config.selection_policy, SelectionPolicy::NewestPublished);
        assert_eq!(
            config.registry_requests_per_minute,
            constants::DEFAULT_REGISTRY_REQUESTS_PER_MINUTE
        );
    }

    #[test]
    fn load_rejects_zero_budget() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"registry_requests_per_minute": 0}"#).expect("write");
        assert!(ModdockConfig::load(&path).is_err());
    }

    #[test]
    fn storage_layout_honors_host_root() {
        let config = ModdockConfig {
            storage_root: "/data/servers".into(),
            host_storage_root: Some("/host/servers".into()),
            ..ModdockConfig::default()
        };
        let layout = config.storage_layout();
        let id = crate::types::ServerId::new("x");
        assert_eq!(layout.server_dir(&id), PathBuf::from("/data/servers/x"));
        assert_eq!(layout.host_server_dir(&id), PathBuf::from("/host/servers/x"));
    }
}
