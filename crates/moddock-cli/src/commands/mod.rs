//! CLI command definitions and dispatch.

pub mod add_mods;
pub mod attach;
pub mod build;
pub mod playset;
pub mod rm;
pub mod server;
pub mod start;
pub mod stop;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use moddock_common::config::ModdockConfig;
use moddock_common::constants::{CONFIG_FILE, data_dir};
use moddock_sdk::ProvisionerBuilder;

/// Moddock: provisions modded game servers from playsets of mods.
#[derive(Parser, Debug)]
#[command(name = "mdk", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Configuration overrides and output options.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Path to the configuration file.
    #[arg(long, global = true, env = "MODDOCK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the store.
    #[arg(long, global = true, env = "MODDOCK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Root of the per-server storage directories.
    #[arg(long, global = true, env = "MODDOCK_STORAGE_ROOT")]
    pub storage_root: Option<PathBuf>,

    /// Storage root as seen by the container engine host.
    #[arg(long, global = true, env = "MODDOCK_HOST_STORAGE_ROOT")]
    pub host_storage_root: Option<PathBuf>,

    /// Container engine endpoint (unix:// or tcp://).
    #[arg(long, global = true, env = "MODDOCK_ENGINE")]
    pub engine: Option<String>,

    /// Base URL of the mod registry.
    #[arg(long, global = true, env = "MODDOCK_REGISTRY_URL")]
    pub registry_url: Option<String>,

    /// Emit logs as JSON.
    #[arg(long, global = true, env = "MODDOCK_LOG_JSON")]
    pub log_json: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

impl GlobalArgs {
    /// Loads the configuration file and applies flag and environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the result is invalid.
    pub fn load_config(&self) -> anyhow::Result<ModdockConfig> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| data_dir().join(CONFIG_FILE));
        let mut config = ModdockConfig::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;

        if let Some(dir) = &self.data_dir {
            config.data_dir.clone_from(dir);
        }
        if let Some(root) = &self.storage_root {
            config.storage_root.clone_from(root);
        }
        if let Some(root) = &self.host_storage_root {
            config.host_storage_root = Some(root.clone());
        }
        if let Some(engine) = &self.engine {
            config.engine_endpoint = Some(engine.clone());
        }
        if let Some(url) = &self.registry_url {
            config.registry_url.clone_from(url);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage servers.
    Server(server::ServerArgs),
    /// Manage playsets.
    Playset(playset::PlaysetArgs),
    /// Resolve a playset's mods for a server.
    Attach(attach::AttachArgs),
    /// Resolve individual mods for a server.
    AddMods(add_mods::AddModsArgs),
    /// Build a server's image.
    Build(build::BuildArgs),
    /// Start a server.
    Start(start::StartArgs),
    /// Stop a server.
    Stop(stop::StopArgs),
    /// Remove a stopped server's container, keeping its world.
    Rm(rm::RmArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.global.load_config()?;
    let provisioner = ProvisionerBuilder::new(config)
        .build()
        .context("failed to initialise moddock")?;
    let json = cli.global.json;

    match cli.command {
        Command::Server(args) => server::execute(args, &provisioner, json).await,
        Command::Playset(args) => playset::execute(args, &provisioner, json).await,
        Command::Attach(args) => attach::execute(args, &provisioner, json).await,
        Command::AddMods(args) => add_mods::execute(args, &provisioner, json).await,
        Command::Build(args) => build::execute(args, &provisioner).await,
        Command::Start(args) => start::execute(args, &provisioner).await,
        Command::Stop(args) => stop::execute(args, &provisioner).await,
        Command::Rm(args) => rm::execute(args, &provisioner).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_work_after_subcommands() {
        let cli = Cli::try_parse_from(["mdk", "build", "s1", "--json", "--engine", "tcp://h:2375"])
            .expect("parse");
        assert!(cli.global.json);
        assert_eq!(cli.global.engine.as_deref(), Some("tcp://h:2375"));
        assert!(matches!(cli.command, Command::Build(_)));
    }

    #[test]
    fn overrides_apply_on_top_of_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"registry_url": "https://file.example", "registry_burst": 3}"#)
            .expect("write");

        let global = GlobalArgs {
            config: Some(path),
            data_dir: Some(dir.path().join("data")),
            registry_url: Some("https://flag.example".into()),
            ..GlobalArgs::default()
        };
        let config = global.load_config().expect("load");
        assert_eq!(config.registry_url, "https://flag.example");
        assert_eq!(config.registry_burst, 3);
        assert_eq!(config.data_dir, dir.path().join("data"));
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let global = GlobalArgs {
            config: Some(dir.path().join("absent.json")),
            ..GlobalArgs::default()
        };
        let config = global.load_config().expect("load");
        assert_eq!(config.registry_url, ModdockConfig::default().registry_url);
    }
}
