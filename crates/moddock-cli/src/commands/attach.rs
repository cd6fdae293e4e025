//! `mdk attach`: Resolve a playset's mods for a server.

use clap::Args;
use moddock_common::types::{PlaysetId, ServerId};
use moddock_sdk::Provisioner;

use super::add_mods::print_added;

/// Arguments for the `attach` command.
#[derive(Args, Debug)]
pub struct AttachArgs {
    /// Server id.
    pub server: String,
    /// Playset id.
    pub playset: String,
}

/// Executes the `attach` command.
///
/// Mods the server already has are kept; only new rows are printed.
///
/// # Errors
///
/// Returns an error if any mod or dependency cannot be resolved, in which
/// case nothing is recorded.
pub async fn execute(args: AttachArgs, provisioner: &Provisioner, json: bool) -> anyhow::Result<()> {
    let added = provisioner
        .attach_playset(
            &ServerId::from(args.server.as_str()),
            &PlaysetId::from(args.playset.as_str()),
        )
        .await?;
    print_added(&added, json)
}
