//! `mdk playset`: Manage named, reusable sets of mods.

use clap::{Args, Subcommand};
use moddock_common::types::{PlaysetId, ProjectId};
use moddock_sdk::Provisioner;
use serde::Serialize;

use crate::output::{format_timestamp, print_json, print_table};

/// Arguments for the `playset` command.
#[derive(Args, Debug)]
pub struct PlaysetArgs {
    /// Playset subcommand.
    #[command(subcommand)]
    pub command: PlaysetCommand,
}

/// Playset subcommands.
#[derive(Subcommand, Debug)]
pub enum PlaysetCommand {
    /// Create an empty playset.
    Create {
        /// Display name.
        name: String,
    },
    /// List playsets.
    List,
    /// Show a playset and its mods.
    Show {
        /// Playset id.
        playset: String,
    },
    /// Add registry mods to a playset.
    Add {
        /// Playset id.
        playset: String,
        /// Registry project ids.
        #[arg(required = true)]
        projects: Vec<String>,
    },
    /// Add the mods of a registry collection to a playset.
    AddCollection {
        /// Playset id.
        playset: String,
        /// Registry collection id.
        collection: String,
    },
    /// Remove a mod from a playset.
    Remove {
        /// Playset id.
        playset: String,
        /// Registry project id.
        project: String,
    },
    /// Delete a playset.
    Delete {
        /// Playset id.
        playset: String,
    },
}

#[derive(Serialize)]
struct PlaysetJson<'a> {
    #[serde(flatten)]
    playset: &'a moddock_store::Playset,
    mods: &'a [moddock_store::ModRecord],
}

/// Executes the `playset` command.
///
/// # Errors
///
/// Returns an error if the playset operation fails.
pub async fn execute(args: PlaysetArgs, provisioner: &Provisioner, json: bool) -> anyhow::Result<()> {
    match args.command {
        PlaysetCommand::Create { name } => {
            let playset = provisioner.create_playset(name)?;
            if json {
                return print_json(&playset);
            }
            println!("Created playset {} ({})", playset.name, playset.id);
        }
        PlaysetCommand::List => {
            let playsets = provisioner.list_playsets()?;
            if json {
                return print_json(&playsets);
            }
            let rows: Vec<Vec<String>> = playsets
                .iter()
                .map(|p| vec![p.id.to_string(), p.name.clone(), format_timestamp(&p.created_at)])
                .collect();
            print_table(&["PLAYSET ID", "NAME", "CREATED"], &rows, "No playsets found.");
        }
        PlaysetCommand::Show { playset } => {
            let (playset, mods) = provisioner.playset(&PlaysetId::from(playset.as_str()))?;
            if json {
                return print_json(&PlaysetJson {
                    playset: &playset,
                    mods: &mods,
                });
            }
            println!("Playset: {} ({})", playset.name, playset.id);
            println!();
            let rows: Vec<Vec<String>> = mods
                .iter()
                .map(|m| vec![m.project_id.to_string(), m.title.clone()])
                .collect();
            print_table(&["PROJECT", "TITLE"], &rows, "No mods in this playset.");
        }
        PlaysetCommand::Add { playset, projects } => {
            let ids: Vec<ProjectId> = projects.iter().map(|p| ProjectId::from(p.as_str())).collect();
            let linked = provisioner
                .add_mods_to_playset(&PlaysetId::from(playset.as_str()), &ids)
                .await?;
            println!("Added {linked} mod(s) to playset {playset}");
        }
        PlaysetCommand::AddCollection {
            playset,
            collection,
        } => {
            let linked = provisioner
                .add_collection_to_playset(&PlaysetId::from(playset.as_str()), &collection)
                .await?;
            println!("Added {linked} mod(s) from collection {collection} to playset {playset}");
        }
        PlaysetCommand::Remove { playset, project } => {
            provisioner.remove_mod_from_playset(
                &PlaysetId::from(playset.as_str()),
                &ProjectId::from(project.as_str()),
            )?;
            println!("Removed {project} from playset {playset}");
        }
        PlaysetCommand::Delete { playset } => {
            let collected = provisioner.delete_playset(&PlaysetId::from(playset.as_str()))?;
            println!("Deleted playset {playset} ({collected} unused mod record(s) dropped)");
        }
    }
    Ok(())
}
