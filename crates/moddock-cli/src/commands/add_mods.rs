//! `mdk add-mods`: Resolve individual mods for a server.

use clap::Args;
use moddock_common::types::{ProjectId, ResolvedMod, ServerId};
use moddock_sdk::Provisioner;

use crate::output::{print_json, print_table};

/// Arguments for the `add-mods` command.
#[derive(Args, Debug)]
pub struct AddModsArgs {
    /// Server id.
    pub server: String,
    /// Registry project ids.
    #[arg(required = true)]
    pub projects: Vec<String>,
}

/// Executes the `add-mods` command.
///
/// # Errors
///
/// Returns an error if any mod or dependency cannot be resolved, in which
/// case nothing is recorded.
pub async fn execute(args: AddModsArgs, provisioner: &Provisioner, json: bool) -> anyhow::Result<()> {
    let ids: Vec<ProjectId> = args.projects.iter().map(|p| ProjectId::from(p.as_str())).collect();
    let added = provisioner
        .add_mods(&ServerId::from(args.server.as_str()), &ids)
        .await?;
    print_added(&added, json)
}

/// Prints newly resolved mods.
///
/// # Errors
///
/// Returns an error if JSON output cannot be serialized.
pub fn print_added(added: &[ResolvedMod], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(added);
    }
    let rows: Vec<Vec<String>> = added
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
    print_table(
        &["PROJECT", "TITLE", "VERSION", "ROLE"],
        &rows,
        "No new mods; the server already has everything requested.",
    );
    Ok(())
}
