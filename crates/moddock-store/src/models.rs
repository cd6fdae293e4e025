//! Persisted records.

use chrono::{DateTime, Utc};
use moddock_common::settings::ServerSettings;
use moddock_common::types::{PlaysetId, ProjectId, ResolvedMod, ServerId};
use serde::{Deserialize, Serialize};

/// A provisioned game server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// Server identity.
    pub id: ServerId,
    /// Display name.
    pub name: String,
    /// Loader, target game version, and gameplay settings.
    pub settings: ServerSettings,
    /// Playset most recently attached, if any.
    #[serde(default)]
    pub playset_id: Option<PlaysetId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A named, reusable set of mods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playset {
    /// Playset identity.
    pub id: PlaysetId,
    /// Display name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A mod known to at least one playset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModRecord {
    /// Registry project id.
    pub project_id: ProjectId,
    /// Display title.
    pub title: String,
}

/// Membership of a mod in a playset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaysetMod {
    /// Owning playset.
    pub playset_id: PlaysetId,
    /// Member mod.
    pub project_id: ProjectId,
}

/// A mod resolved for one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedServerMod {
    /// Owning server.
    pub server_id: ServerId,
    /// Selected version and role.
    #[serde(flatten)]
    pub resolved: ResolvedMod,
}
