//! Registry wire models.

use chrono::{DateTime, Utc};
use moddock_common::types::{Loader, ProjectId, VersionId};
use serde::{Deserialize, Serialize};

/// A registry project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Registry project id.
    pub id: ProjectId,
    /// Display title.
    pub title: String,
    /// Project type (`mod`, `modpack`, `resourcepack`, ...).
    pub project_type: String,
}

impl Project {
    /// Whether this project is installable as a server mod.
    #[must_use]
    pub fn is_mod(&self) -> bool {
        self.project_type == "mod"
    }
}

/// How a version depends on another project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    /// Must be installed alongside.
    Required,
    /// Enhances the dependent when present.
    Optional,
    /// Must not be installed alongside.
    Incompatible,
    /// Shipped inside the dependent's own file.
    Embedded,
}

/// One dependency declared by a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Project depended upon, when declared.
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    /// Pinned version, when declared.
    #[serde(default)]
    pub version_id: Option<VersionId>,
    /// Dependency type.
    pub dependency_type: DependencyType,
}

impl Dependency {
    /// Declares a dependency on a project.
    #[must_use]
    pub fn on(project_id: impl Into<ProjectId>, dependency_type: DependencyType) -> Self {
        Self {
            project_id: Some(project_id.into()),
            version_id: None,
            dependency_type,
        }
    }
}

/// A downloadable file of a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionFile {
    /// Download URL.
    pub url: String,
    /// File name.
    #[serde(default)]
    pub filename: Option<String>,
    /// Whether this is the version's primary file.
    #[serde(default)]
    pub primary: bool,
}

/// One published version of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Version id.
    pub id: VersionId,
    /// Project this version belongs to.
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    /// Display name.
    pub name: String,
    /// Loaders this version runs on.
    #[serde(default)]
    pub loaders: Vec<String>,
    /// Game versions this version supports.
    #[serde(default)]
    pub game_versions: Vec<String>,
    /// Declared dependencies.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Downloadable files.
    #[serde(default)]
    pub files: Vec<VersionFile>,
    /// Publication timestamp.
    #[serde(default)]
    pub date_published: Option<DateTime<Utc>>,
}

impl Version {
    /// Whether the version declares support for `loader`.
    #[must_use]
    pub fn supports_loader(&self, loader: Loader) -> bool {
        self.loaders.iter().any(|l| l == loader.as_str())
    }

    /// Download URL of the primary file, falling back to the first file.
    #[must_use]
    pub fn download_url(&self) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.primary)
            .or_else(|| self.files.first())
            .map(|f| f.url.as_str())
    }
}

/// A registry collection of projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Collection id.
    #[serde(default)]
    pub id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Projects in the collection.
    #[serde(default)]
    pub projects: Vec<ProjectId>,
}

/// The version chosen for a mod, reduced to what later stages need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Version id.
    pub id: VersionId,
    /// Display name.
    pub name: String,
    /// Download URL of the file to install.
    pub download_url: String,
    /// Game versions the version supports.
    pub game_versions: Vec<String>,
    /// Declared dependencies.
    pub dependencies: Vec<Dependency>,
}

impl VersionInfo {
    /// Reduces a registry version, returning `None` when it has no file.
    #[must_use]
    pub fn from_version(version: Version) -> Option<Self> {
        let download_url = version.download_url()?.to_string();
        Some(Self {
            id: version.id,
            name: version.name,
            download_url,
            game_versions: version.game_versions,
            dependencies: version.dependencies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERSION_JSON: &str = r#"{
        "id": "IZskON6d",
        "project_id": "AANobbMI",
        "name": "Sodium 0.5.3",
        "loaders": ["fabric", "quilt"],
        "game_versions": ["1.20.1"],
        "date_published": "2023-09-21T17:32:11.000000Z",
        "dependencies": [
            {"project_id": "P7dR8mSH", "version_id": null, "dependency_type": "required"},
            {"project_id": null, "version_id": "abc", "dependency_type": "embedded"}
        ],
        "files": [
            {"url": "https://cdn.example/extra.jar", "filename": "extra.jar", "primary": false},
            {"url": "https://cdn.example/sodium.jar", "filename": "sodium.jar", "primary": true}
        ]
    }"#;

    #[test]
    fn version_deserializes_registry_payload() {
        let v: Version = serde_json::from_str(VERSION_JSON).expect("parse");
        assert_eq!(v.id.as_str(), "IZskON6d");
        assert!(v.supports_loader(Loader::Fabric));
        assert!(!v.supports_loader(Loader::Paper));
        assert_eq!(v.dependencies.len(), 2);
        assert_eq!(v.dependencies[0].dependency_type, DependencyType::Required);
        assert!(v.dependencies[1].project_id.is_none());
        assert!(v.date_published.is_some());
    }

    #[test]
    fn download_url_prefers_primary_file() {
        let v: Version = serde_json::from_str(VERSION_JSON).expect("parse");
        assert_eq!(v.download_url(), Some("https://cdn.example/sodium.jar"));
    }

    #[test]
    fn version_without_files_has_no_info() {
        let mut v: Version = serde_json::from_str(VERSION_JSON).expect("parse");
        v.files.clear();
        assert!(VersionInfo::from_version(v).is_none());
    }

    #[test]
    fn only_mod_projects_are_installable() {
        let p: Project = serde_json::from_str(
            r#"{"id": "x", "title": "Pack", "project_type": "modpack", "slug": "pack"}"#,
        )
        .expect("parse");
        assert!(!p.is_mod());
    }
}
