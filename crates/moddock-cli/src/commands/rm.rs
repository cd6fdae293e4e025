//! `mdk rm`: Remove a stopped server's container.
//!
//! The image and the world stay; the next `mdk start` creates a fresh
//! container from the current image.

use clap::Args;
use moddock_common::types::ServerId;
use moddock_sdk::Provisioner;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Server id.
    pub server: String,
}

/// Executes the `rm` command.
///
/// # Errors
///
/// Returns an error if the server is still running or the engine fails.
pub async fn execute(args: RmArgs, provisioner: &Provisioner) -> anyhow::Result<()> {
    let id = ServerId::from(args.server.as_str());
    if provisioner.remove_container(&id).await? {
        println!("Removed the container of server {id}");
    } else {
        println!("Server {id} has no container");
    }
    Ok(())
}
