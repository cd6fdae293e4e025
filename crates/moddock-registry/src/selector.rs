//! Compatible version selection.

use std::sync::Arc;

use moddock_common::config::SelectionPolicy;
use moddock_common::error::{ModdockError, Result};
use moddock_common::types::{Loader, ProjectId};

use crate::client::ModRegistry;
use crate::models::{Version, VersionInfo};

/// Picks one version of a mod for a loader and game version.
#[derive(Clone)]
pub struct VersionSelector {
    registry: Arc<dyn ModRegistry>,
    policy: SelectionPolicy,
}

impl std::fmt::Debug for VersionSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionSelector")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl VersionSelector {
    /// Creates a selector over the given registry.
    #[must_use]
    pub fn new(registry: Arc<dyn ModRegistry>, policy: SelectionPolicy) -> Self {
        Self { registry, policy }
    }

    /// Returns the registry this selector queries.
    #[must_use]
    pub fn registry(&self) -> &Arc<dyn ModRegistry> {
        &self.registry
    }

    /// Selects a version of `project` for `loader` on `game_version`.
    ///
    /// # Errors
    ///
    /// Returns `ModdockError::NoCompatibleVersion` when no listed version
    /// supports the loader and game version and carries a downloadable file;
    /// registry failures propagate unchanged.
    pub async fn select(
        &self,
        project: &ProjectId,
        loader: Loader,
        game_version: &str,
    ) -> Result<VersionInfo> {
        let versions = self
            .registry
            .project_versions(project, &[game_version.to_string()])
            .await?;
        let listed = versions.len();

        let chosen = pick(versions, loader, game_version, self.policy).ok_or_else(|| {
            ModdockError::NoCompatibleVersion {
                project: project.to_string(),
                loader: loader.to_string(),
                game_version: game_version.to_string(),
                required_by: Vec::new(),
            }
        })?;
        tracing::debug!(
            project = %project,
            version = %chosen.id,
            listed,
            "selected version"
        );
        Ok(chosen)
    }
}

/// Filters `versions` to compatible ones and applies the tie-break policy.
fn pick(
    versions: Vec<Version>,
    loader: Loader,
    game_version: &str,
    policy: SelectionPolicy,
) -> Option<VersionInfo> {
    let mut compatible: Vec<Version> = versions
        .into_iter()
        .filter(|v| v.supports_loader(loader))
        .filter(|v| v.game_versions.iter().any(|g| g == game_version))
        .filter(|v| v.download_url().is_some())
        .collect();

    if policy == SelectionPolicy::NewestPublished {
        // Stable: undated versions keep registry order behind dated ones.
        compatible.sort_by(|a, b| b.date_published.cmp(&a.date_published));
    }

    compatible.into_iter().next().and_then(VersionInfo::from_version)
}
