//! `mdk server`: Create, inspect, reconfigure, and delete servers.

use clap::{Args, Subcommand};
use moddock_common::settings::{Difficulty, GameMode, ServerSettings};
use moddock_common::types::{Loader, ServerId};
use moddock_sdk::Provisioner;
use serde::Serialize;

use crate::output::{format_status, format_timestamp, print_json, print_table};

/// Arguments for the `server` command.
#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Server subcommand.
    #[command(subcommand)]
    pub command: ServerCommand,
}

/// Server subcommands.
#[derive(Subcommand, Debug)]
pub enum ServerCommand {
    /// Create a server.
    Create(CreateArgs),
    /// List servers.
    List,
    /// Show a server, its mods, and its container status.
    Show {
        /// Server id.
        server: String,
    },
    /// Change a server's settings.
    Set(SetArgs),
    /// Delete a server with its container, image, and world.
    Delete {
        /// Server id.
        server: String,
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}

/// Arguments for `server create`.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Display name.
    pub name: String,

    /// Loader to run (fabric, paper).
    #[arg(long, short)]
    pub loader: Loader,

    /// Target game version, e.g. 1.20.1.
    #[arg(long, short = 'g')]
    pub game_version: String,

    /// Settings to apply on top of the defaults.
    #[command(flatten)]
    pub settings: SettingsArgs,
}

/// Arguments for `server set`.
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Server id.
    pub server: String,

    /// Loader to run (fabric, paper). Drops the resolved mods.
    #[arg(long, short)]
    pub loader: Option<Loader>,

    /// Target game version. Drops the resolved mods.
    #[arg(long, short = 'g')]
    pub game_version: Option<String>,

    /// Settings to change.
    #[command(flatten)]
    pub settings: SettingsArgs,
}

/// Optional server settings shared by `create` and `set`.
#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// Host port mapped to the game port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Memory for the game, in MiB.
    #[arg(long)]
    pub memory: Option<u32>,

    /// Accept (true) or decline (false) the game EULA.
    #[arg(long)]
    pub eula: Option<bool>,

    /// Operator player name; repeat for several. Replaces the list.
    #[arg(long = "op")]
    pub ops: Vec<String>,

    /// Message of the day.
    #[arg(long)]
    pub motd: Option<String>,

    /// World difficulty (peaceful, easy, normal, hard).
    #[arg(long)]
    pub difficulty: Option<Difficulty>,

    /// Default game mode (survival, creative, adventure, spectator).
    #[arg(long)]
    pub gamemode: Option<GameMode>,

    /// Maximum concurrent players.
    #[arg(long)]
    pub max_players: Option<u32>,

    /// Whether players can damage each other.
    #[arg(long)]
    pub pvp: Option<bool>,

    /// Whether connecting players are authenticated.
    #[arg(long)]
    pub online_mode: Option<bool>,

    /// View distance in chunks.
    #[arg(long)]
    pub view_distance: Option<u32>,

    /// World seed.
    #[arg(long)]
    pub seed: Option<String>,
}

impl SettingsArgs {
    /// Overwrites the settings named on the command line.
    pub fn apply(self, settings: &mut ServerSettings) {
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(memory) = self.memory {
            settings.allocated_memory_mb = memory;
        }
        if let Some(eula) = self.eula {
            settings.eula = eula;
        }
        if !self.ops.is_empty() {
            settings.ops = self.ops;
        }
        let properties = &mut settings.properties;
        if let Some(motd) = self.motd {
            properties.motd = motd;
        }
        if let Some(difficulty) = self.difficulty {
            properties.difficulty = difficulty;
        }
        if let Some(gamemode) = self.gamemode {
            properties.gamemode = gamemode;
        }
        if let Some(max_players) = self.max_players {
            properties.max_players = max_players;
        }
        if let Some(pvp) = self.pvp {
            properties.pvp = pvp;
        }
        if let Some(online_mode) = self.online_mode {
            properties.online_mode = online_mode;
        }
        if let Some(view_distance) = self.view_distance {
            properties.view_distance = view_distance;
        }
        if self.seed.is_some() {
            properties.level_seed = self.seed;
        }
    }
}

#[derive(Serialize)]
struct ServerJson<'a> {
    #[serde(flatten)]
    server: &'a moddock_store::Server,
    status: String,
    mods: &'a [moddock_common::types::ResolvedMod],
}

/// Executes the `server` command.
///
/// # Errors
///
/// Returns an error if the server operation fails.
pub async fn execute(args: ServerArgs, provisioner: &Provisioner, json: bool) -> anyhow::Result<()> {
    match args.command {
        ServerCommand::Create(args) => {
            let mut settings = ServerSettings::new(args.loader, args.game_version);
            args.settings.apply(&mut settings);
            let server = provisioner.create_server(args.name, settings)?;
            if json {
                return print_json(&server);
            }
            println!("Created server {} ({})", server.name, server.id);
            if !server.settings.eula {
                println!("The game EULA is not accepted yet; set it with `mdk server set {} --eula true`.", server.id);
            }
        }
        ServerCommand::List => {
            let servers = provisioner.list_servers()?;
            if json {
                return print_json(&servers);
            }
            let rows: Vec<Vec<String>> = servers
                .iter()
                .map(|s| {
                    vec![
                        s.id.to_string(),
                        s.name.clone(),
                        s.settings.loader.to_string(),
                        s.settings.game_version.clone(),
                        s.settings.port.to_string(),
                        format_timestamp(&s.created_at),
                    ]
                })
                .collect();
            print_table(
                &["SERVER ID", "NAME", "LOADER", "VERSION", "PORT", "CREATED"],
                &rows,
                "No servers found.",
            );
        }
        ServerCommand::Show { server } => {
            let details = provisioner.server(&ServerId::from(server.as_str())).await?;
            let status = format_status(details.status);
            if json {
                return print_json(&ServerJson {
                    server: &details.server,
                    status,
                    mods: &details.mods,
                });
            }
            let s = &details.server;
            println!("Server:    {} ({})", s.name, s.id);
            println!("Loader:    {} {}", s.settings.loader.title(), s.settings.game_version);
            println!("Port:      {}", s.settings.port);
            println!("Memory:    {} MiB", s.settings.allocated_memory_mb);
            println!("EULA:      {}", if s.settings.eula { "accepted" } else { "not accepted" });
            println!(
                "Playset:   {}",
                s.playset_id.as_ref().map_or_else(|| "-".to_string(), ToString::to_string)
            );
            println!("Container: {status}");
            println!();
            let rows: Vec<Vec<String>> = details
                .mods
                .iter()
                .map(|m| {
                    vec![
                        m.project_id.to_string(),
                        m.title.clone(),
                        m.version_name.clone(),
                        m.role.as_str().to_string(),
                    ]
                })
                .collect();
            print_table(&["PROJECT", "TITLE", "VERSION", "ROLE"], &rows, "No mods resolved.");
        }
        ServerCommand::Set(args) => {
            let id = ServerId::from(args.server.as_str());
            let mut settings = provisioner.store().get_server(&id)?.settings;
            if let Some(loader) = args.loader {
                settings.loader = loader;
            }
            if let Some(game_version) = args.game_version {
                settings.game_version = game_version;
            }
            args.settings.apply(&mut settings);
            let server = provisioner.update_settings(&id, settings).await?;
            if json {
                return print_json(&server);
            }
            println!("Updated server {}", server.id);
        }
        ServerCommand::Delete { server, yes } => {
            if !yes {
                anyhow::bail!("deleting a server destroys its world; pass --yes to confirm");
            }
            let id = ServerId::from(server.as_str());
            provisioner.delete_server(&id).await?;
            println!("Deleted server {id}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_named_settings_change() {
        let mut settings = ServerSettings::new(Loader::Paper, "1.20.1");
        let before = settings.clone();
        SettingsArgs::default().apply(&mut settings);
        assert_eq!(settings, before);

        SettingsArgs {
            port: Some(25570),
            eula: Some(true),
            ops: vec!["alex".into()],
            difficulty: Some(Difficulty::Hard),
            seed: Some("42".into()),
            ..SettingsArgs::default()
        }
        .apply(&mut settings);
        assert_eq!(settings.port, 25570);
        assert!(settings.eula);
        assert_eq!(settings.ops, vec!["alex"]);
        assert_eq!(settings.properties.difficulty, Difficulty::Hard);
        assert_eq!(settings.properties.level_seed.as_deref(), Some("42"));
        assert_eq!(settings.allocated_memory_mb, before.allocated_memory_mb);
    }
}
