//! `mdk build`: Compile a server's build descriptor and build its image.

use clap::Args;
use moddock_common::types::ServerId;
use moddock_sdk::Provisioner;

/// Arguments for the `build` command.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Server id.
    pub server: String,
}

/// Executes the `build` command.
///
/// # Errors
///
/// Returns an error if the launcher cannot be located or the build fails;
/// a failed build reports the tail of the build log.
pub async fn execute(args: BuildArgs, provisioner: &Provisioner) -> anyhow::Result<()> {
    let id = ServerId::from(args.server.as_str());
    tracing::info!(server_id = %id, "building server image");
    let report = provisioner.build(&id).await?;
    println!("Built image {} with {} mod(s)", report.image, report.mods);
    println!("Descriptor digest: {}", report.digest);
    Ok(())
}
