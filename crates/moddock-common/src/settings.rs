//! Server settings and the immutable build record derived from them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModdockError, Result};
use crate::types::{Loader, ServerId};

/// Lowest host port a server may bind.
pub const MIN_HOST_PORT: u16 = 1024;
/// Highest host port a server may bind.
pub const MAX_HOST_PORT: u16 = 49151;
/// Smallest memory allocation accepted, in MiB.
pub const MIN_ALLOCATED_MEMORY_MB: u32 = 1024;

/// World difficulty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// No hostile mobs.
    Peaceful,
    /// Easy.
    #[default]
    Easy,
    /// Normal.
    Normal,
    /// Hard.
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Peaceful => "peaceful",
            Self::Easy => "easy",
            Self::Normal => "normal",
            Self::Hard => "hard",
        })
    }
}

impl FromStr for Difficulty {
    type Err = ModdockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "peaceful" => Ok(Self::Peaceful),
            "easy" => Ok(Self::Easy),
            "normal" => Ok(Self::Normal),
            "hard" => Ok(Self::Hard),
            other => Err(ModdockError::Config {
                message: format!("unknown difficulty: {other}"),
            }),
        }
    }
}

/// Default game mode for joining players.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Survival.
    #[default]
    Survival,
    /// Creative.
    Creative,
    /// Adventure.
    Adventure,
    /// Spectator.
    Spectator,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Survival => "survival",
            Self::Creative => "creative",
            Self::Adventure => "adventure",
            Self::Spectator => "spectator",
        })
    }
}

impl FromStr for GameMode {
    type Err = ModdockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "survival" => Ok(Self::Survival),
            "creative" => Ok(Self::Creative),
            "adventure" => Ok(Self::Adventure),
            "spectator" => Ok(Self::Spectator),
            other => Err(ModdockError::Config {
                message: format!("unknown game mode: {other}"),
            }),
        }
    }
}

/// Gameplay properties rendered into `server.properties`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct GameProperties {
    /// Message of the day shown in the server list.
    pub motd: String,
    /// World difficulty.
    pub difficulty: Difficulty,
    /// Default game mode.
    pub gamemode: GameMode,
    /// Maximum concurrent players.
    pub max_players: u32,
    /// Whether players can damage each other.
    pub pvp: bool,
    /// Whether connecting players are authenticated.
    pub online_mode: bool,
    /// View distance in chunks.
    pub view_distance: u32,
    /// Simulation distance in chunks.
    pub simulation_distance: u32,
    /// Hardcore mode.
    pub hardcore: bool,
    /// Whether command blocks are enabled.
    pub enable_command_block: bool,
    /// Whether flight is allowed in survival.
    pub allow_flight: bool,
    /// Whether only whitelisted players may join.
    pub white_list: bool,
    /// Spawn protection radius.
    pub spawn_protection: u32,
    /// World seed, random when absent.
    pub level_seed: Option<String>,
}

impl Default for GameProperties {
    fn default() -> Self {
        Self {
            motd: "A Moddock server".into(),
            difficulty: Difficulty::default(),
            gamemode: GameMode::default(),
            max_players: 20,
            pvp: true,
            online_mode: true,
            view_distance: 10,
            simulation_distance: 10,
            hardcore: false,
            enable_command_block: false,
            allow_flight: false,
            white_list: false,
            spawn_protection: 16,
            level_seed: None,
        }
    }
}

impl GameProperties {
    /// Returns the properties as sorted `server.properties` key/value pairs.
    #[must_use]
    pub fn entries(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("allow-flight", self.allow_flight.to_string()),
            ("difficulty", self.difficulty.to_string()),
            ("enable-command-block", self.enable_command_block.to_string()),
            ("gamemode", self.gamemode.to_string()),
            ("hardcore", self.hardcore.to_string()),
            ("level-name", "world".to_string()),
            ("level-seed", self.level_seed.clone().unwrap_or_default()),
            ("max-players", self.max_players.to_string()),
            ("motd", self.motd.clone()),
            ("online-mode", self.online_mode.to_string()),
            ("pvp", self.pvp.to_string()),
            ("simulation-distance", self.simulation_distance.to_string()),
            ("spawn-protection", self.spawn_protection.to_string()),
            ("view-distance", self.view_distance.to_string()),
            ("white-list", self.white_list.to_string()),
        ])
    }
}

/// Mutable per-server settings as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Loader the server runs.
    pub loader: Loader,
    /// Target game version, e.g. `1.20.1`.
    pub game_version: String,
    /// Host port mapped to the game port.
    pub port: u16,
    /// Whether the game EULA has been accepted.
    pub eula: bool,
    /// Memory handed to the JVM, in MiB.
    pub allocated_memory_mb: u32,
    /// Operator player names.
    #[serde(default)]
    pub ops: Vec<String>,
    /// Gameplay properties.
    #[serde(default)]
    pub properties: GameProperties,
}

impl ServerSettings {
    /// Creates settings with defaults for everything but the target.
    #[must_use]
    pub fn new(loader: Loader, game_version: impl Into<String>) -> Self {
        Self {
            loader,
            game_version: game_version.into(),
            port: crate::constants::DEFAULT_GAME_PORT,
            eula: false,
            allocated_memory_mb: 2048,
            ops: Vec::new(),
            properties: GameProperties::default(),
        }
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ModdockError::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if parse_release(&self.game_version).is_none() {
            return Err(ModdockError::Config {
                message: format!("invalid game version: {}", self.game_version),
            });
        }
        if !(MIN_HOST_PORT..=MAX_HOST_PORT).contains(&self.port) {
            return Err(ModdockError::Config {
                message: format!(
                    "port {} outside {MIN_HOST_PORT}..={MAX_HOST_PORT}",
                    self.port
                ),
            });
        }
        if self.allocated_memory_mb < MIN_ALLOCATED_MEMORY_MB {
            return Err(ModdockError::Config {
                message: format!(
                    "allocated memory must be at least {MIN_ALLOCATED_MEMORY_MB} MiB"
                ),
            });
        }
        Ok(())
    }
}

/// Everything the descriptor compiler needs to know about one server.
///
/// Assembled once per build from the stored settings plus the launcher URL;
/// stages downstream only ever read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerBuildSettings {
    /// Server identity.
    pub server_id: ServerId,
    /// Display name.
    pub name: String,
    /// Loader the server runs.
    pub loader: Loader,
    /// Target game version.
    pub game_version: String,
    /// Download URL of the loader's server launcher.
    pub launcher_url: String,
    /// Host port mapped to the game port.
    pub port: u16,
    /// Whether the game EULA has been accepted.
    pub eula: bool,
    /// Memory handed to the JVM, in MiB.
    pub allocated_memory_mb: u32,
    /// Operator player names.
    pub ops: Vec<String>,
    /// Gameplay properties.
    pub properties: GameProperties,
}

impl ServerBuildSettings {
    /// Assembles the build record for a server.
    #[must_use]
    pub fn new(
        server_id: ServerId,
        name: impl Into<String>,
        settings: &ServerSettings,
        launcher_url: impl Into<String>,
    ) -> Self {
        Self {
            server_id,
            name: name.into(),
            loader: settings.loader,
            game_version: settings.game_version.clone(),
            launcher_url: launcher_url.into(),
            port: settings.port,
            eula: settings.eula,
            allocated_memory_mb: settings.allocated_memory_mb,
            ops: settings.ops.clone(),
            properties: settings.properties.clone(),
        }
    }

    /// Deterministic image and container name, `<loader>-<server_id>`.
    #[must_use]
    pub fn image_name(&self) -> String {
        crate::types::container_name(self.loader, &self.server_id)
    }
}

/// Parses a release version such as `1.20` or `1.20.1` into a triple.
///
/// Snapshots and pre-releases (`23w31a`, `1.20-pre1`) are rejected.
#[must_use]
pub fn parse_release(version: &str) -> Option<(u32, u32, u32)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_release_accepts_two_and_three_parts() {
        assert_eq!(parse_release("1.20.1"), Some((1, 20, 1)));
        assert_eq!(parse_release("1.19"), Some((1, 19, 0)));
    }

    #[test]
    fn difficulty_and_game_mode_parse_case_insensitively() {
        assert_eq!("Hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(" creative ".parse::<GameMode>().unwrap(), GameMode::Creative);
        assert!("nightmare".parse::<Difficulty>().is_err());
    }

    #[test]
    fn parse_release_rejects_snapshots() {
        assert_eq!(parse_release("23w31a"), None);
        assert_eq!(parse_release("1.20-pre1"), None);
        assert_eq!(parse_release("1.2.3.4"), None);
    }

    #[test]
    fn default_settings_validate() {
        ServerSettings::new(Loader::Fabric, "1.20.1")
            .validate()
            .expect("defaults should be valid");
    }

    #[test]
    fn validate_rejects_privileged_port() {
        let mut s = ServerSettings::new(Loader::Fabric, "1.20.1");
        s.port = 80;
        let msg = s.validate().unwrap_err().to_string();
        assert!(msg.contains("port"), "got: {msg}");
    }

    #[test]
    fn validate_rejects_small_memory() {
        let mut s = ServerSettings::new(Loader::Paper, "1.20.1");
        s.allocated_memory_mb = 512;
        assert!(s.validate().is_err());
    }

    #[test]
    fn properties_entries_are_sorted_and_complete() {
        let entries = GameProperties::default().entries();
        let keys: Vec<_> = entries.keys().copied().collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
        assert_eq!(entries.get("difficulty").map(String::as_str), Some("easy"));
        assert_eq!(entries.get("level-seed").map(String::as_str), Some(""));
    }

    #[test]
    fn build_settings_copy_stored_settings() {
        let mut s = ServerSettings::new(Loader::Fabric, "1.20.1");
        s.ops.push("Notch".into());
        let b = ServerBuildSettings::new(ServerId::new("s1"), "survival", &s, "https://x/jar");
        assert_eq!(b.image_name(), "fabric-s1");
        assert_eq!(b.ops, vec!["Notch"]);
        assert_eq!(b.launcher_url, "https://x/jar");
    }
}
