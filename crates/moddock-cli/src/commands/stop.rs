//! `mdk stop`: Bring a server's container to stopped.

use clap::Args;
use moddock_common::types::ServerId;
use moddock_sdk::Provisioner;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Server id.
    pub server: String,
}

/// Executes the `stop` command.
///
/// A container that already exited or never started is reported, not
/// treated as an error.
///
/// # Errors
///
/// Returns an error if the container does not exist or cannot be stopped.
pub async fn execute(args: StopArgs, provisioner: &Provisioner) -> anyhow::Result<()> {
    let outcome = provisioner.stop(&ServerId::from(args.server.as_str())).await?;
    println!("{outcome}");
    Ok(())
}
