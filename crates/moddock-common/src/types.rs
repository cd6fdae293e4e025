//! Domain primitive types used across the Moddock workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModdockError, Result};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from a string value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the inner string representation.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Registry-assigned project identifier. Globally unique, never generated locally.
    ProjectId
);
string_id!(
    /// Registry-assigned identifier of one published version of a project.
    VersionId
);
string_id!(
    /// Locally generated identifier of a server record.
    ServerId
);
string_id!(
    /// Locally generated identifier of a playset.
    PlaysetId
);
string_id!(
    /// Engine-assigned container identifier.
    ContainerId
);

impl ServerId {
    /// Generates a random server ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

impl PlaysetId {
    /// Generates a random playset ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

/// The game-server runtime flavor a server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loader {
    /// Fabric mod loader.
    Fabric,
    /// Paper server.
    Paper,
}

impl Loader {
    /// Every loader, in declaration order.
    pub const ALL: [Self; 2] = [Self::Fabric, Self::Paper];

    /// Lowercase identifier as used by the registry and in container names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fabric => "fabric",
            Self::Paper => "paper",
        }
    }

    /// Capitalized display name.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Fabric => "Fabric",
            Self::Paper => "Paper",
        }
    }
}

impl fmt::Display for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Loader {
    type Err = ModdockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fabric" => Ok(Self::Fabric),
            "paper" => Ok(Self::Paper),
            other => Err(ModdockError::Config {
                message: format!("unknown loader: {other}"),
            }),
        }
    }
}

/// Why a mod is present on a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Explicitly chosen through a playset or direct request.
    Requested,
    /// Pulled in because a resolved mod requires it.
    RequiredDependency,
    /// Pulled in because a resolved mod declares it optional.
    OptionalDependency,
}

impl Role {
    /// All roles in descriptor block order.
    pub const ALL: [Self; 3] = [
        Self::Requested,
        Self::RequiredDependency,
        Self::OptionalDependency,
    ];

    /// Snake-case identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::RequiredDependency => "required_dependency",
            Self::OptionalDependency => "optional_dependency",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mod selected for a server, with the version chosen for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMod {
    /// Registry project id.
    pub project_id: ProjectId,
    /// Project display title.
    pub title: String,
    /// Chosen version id.
    pub version_id: VersionId,
    /// Chosen version display name.
    pub version_name: String,
    /// Game versions the chosen version declares support for.
    pub game_versions: Vec<String>,
    /// Download URL of the chosen file.
    pub download_url: String,
    /// Why the mod is present.
    pub role: Role,
}

/// Returns the deterministic container and image name of a server.
///
/// Containers are looked up by this name only, so the mapping survives
/// restarts of the orchestrator without any persisted state.
#[must_use]
pub fn container_name(loader: Loader, server_id: &ServerId) -> String {
    format!("{loader}-{server_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_name_joins_loader_and_server() {
        let id = ServerId::new("abc123");
        assert_eq!(container_name(Loader::Fabric, &id), "fabric-abc123");
        assert_eq!(container_name(Loader::Paper, &id), "paper-abc123");
    }

    #[test]
    fn generated_server_ids_are_unique() {
        assert_ne!(ServerId::generate(), ServerId::generate());
    }

    #[test]
    fn loader_parses_case_insensitively() {
        assert_eq!("Fabric".parse::<Loader>().unwrap(), Loader::Fabric);
        assert_eq!(" paper ".parse::<Loader>().unwrap(), Loader::Paper);
        assert!("forge".parse::<Loader>().is_err());
    }

    #[test]
    fn role_serializes_as_snake_case() {
        let json = serde_json::to_string(&Role::RequiredDependency).unwrap();
        assert_eq!(json, "\"required_dependency\"");
    }

    #[test]
    fn project_id_serializes_transparently() {
        let json = serde_json::to_string(&ProjectId::new("P7dR8mSH")).unwrap();
        assert_eq!(json, "\"P7dR8mSH\"");
    }
}
