//! System-wide constants and default paths.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Default base directory for Moddock data when running as a system service.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/moddock";

/// Returns the data directory, preferring `$HOME/.moddock` for user
/// sessions, falling back to `/var/lib/moddock`.
fn resolve_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        let user_dir = PathBuf::from(home).join(".moddock");
        if std::fs::create_dir_all(&user_dir).is_ok() {
            return user_dir;
        }
    }
    PathBuf::from(SYSTEM_DATA_DIR)
}

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the resolved data directory for this session.
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(resolve_data_dir)
}

/// Application name used in CLI output and state files.
pub const APP_NAME: &str = "moddock";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "mdk";

/// User agent sent to the registry and launcher metadata services.
pub const USER_AGENT: &str = concat!("moddock/", env!("CARGO_PKG_VERSION"));

/// Name of the store file inside the data directory.
pub const STORE_FILE: &str = "store.json";

/// Directory of per-server lock files inside the data directory.
pub const LOCKS_DIR: &str = "locks";

/// Name of the configuration file inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Base URL of the mod registry.
pub const DEFAULT_REGISTRY_URL: &str = "https://api.modrinth.com";

/// Base URL of the Fabric metadata service.
pub const FABRIC_META_URL: &str = "https://meta.fabricmc.net";

/// Base URL of the PaperMC download API.
pub const PAPER_API_URL: &str = "https://api.papermc.io";

/// Default registry budget, requests per minute.
pub const DEFAULT_REGISTRY_REQUESTS_PER_MINUTE: u32 = 300;

/// Default registry burst size.
pub const DEFAULT_REGISTRY_BURST: u32 = 10;

/// Default timeout for a single external request, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Port the game listens on inside the container.
pub const DEFAULT_GAME_PORT: u16 = 25565;

/// Exposed port key used by the container engine.
pub const CONTAINER_GAME_PORT: &str = "25565/tcp";

/// Working directory of the game inside the container.
pub const CONTAINER_WORKDIR: &str = "/minecraft";

/// Number of build log lines kept in a build failure.
pub const BUILD_LOG_TAIL_LINES: usize = 20;

/// Seconds the engine waits for a graceful stop before killing.
pub const STOP_TIMEOUT_SECS: i64 = 30;

/// Timeout for one container engine call, in seconds. Image builds run
/// inside a single call, so this is far above the request timeout.
pub const ENGINE_TIMEOUT_SECS: u64 = 900;
