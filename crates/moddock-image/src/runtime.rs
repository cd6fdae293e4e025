//! Java runtime requirements.

use moddock_common::error::{ModdockError, Result};
use moddock_common::settings::parse_release;
use moddock_common::types::Loader;

/// Java major version a server needs.
///
/// Both loaders follow the game's own requirement: Java 8 before 1.17,
/// 16 for 1.17, 17 from 1.18 through 1.20.4, and 21 from 1.20.5 on.
///
/// # Errors
///
/// Returns `Config` if `game_version` is not a release version.
pub fn java_version(loader: Loader, game_version: &str) -> Result<u32> {
    let release = parse_release(game_version).ok_or_else(|| ModdockError::Config {
        message: format!("cannot determine Java runtime for {loader} {game_version}"),
    })?;
    let java = match release {
        (1, minor, _) if minor < 17 => 8,
        (1, 17, _) => 16,
        (1, 18..=19, _) | (1, 20, 0..=4) => 17,
        _ => 21,
    };
    Ok(java)
}

/// Base image providing the Java runtime.
#[must_use]
pub fn base_image(java: u32) -> String {
    format!("eclipse-temurin:{java}-jre")
}
