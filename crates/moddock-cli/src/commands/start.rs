//! `mdk start`: Bring a server's container to running.

use clap::Args;
use moddock_common::types::ServerId;
use moddock_sdk::Provisioner;

/// Arguments for the `start` command.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Server id.
    pub server: String,
}

/// Executes the `start` command.
///
/// # Errors
///
/// Returns an error if the image has not been built or the container
/// cannot be started.
pub async fn execute(args: StartArgs, provisioner: &Provisioner) -> anyhow::Result<()> {
    let outcome = provisioner.start(&ServerId::from(args.server.as_str())).await?;
    println!("{outcome}");
    Ok(())
}
