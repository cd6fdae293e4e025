//! Server launcher discovery.
//!
//! Fabric serves a launcher jar per (game, loader, installer) version
//! triple from its meta service; Paper publishes numbered builds per game
//! version. Either way the result is one download URL baked into the image.

use std::time::Duration;

use async_trait::async_trait;
use moddock_common::constants::{FABRIC_META_URL, PAPER_API_URL, USER_AGENT};
use moddock_common::error::{ModdockError, Result};
use moddock_common::types::Loader;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

const SERVICE: &str = "launcher";

/// Finds the server launcher download for a loader and game version.
#[async_trait]
pub trait LauncherLocator: Send + Sync {
    /// Returns the launcher download URL.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the loader publishes nothing for the game
    /// version, or `ExternalService` on transport failures.
    async fn launcher_url(&self, loader: Loader, game_version: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct FabricLoaderEntry {
    loader: FabricVersion,
}

#[derive(Debug, Clone, Deserialize)]
struct FabricVersion {
    version: String,
    #[serde(default)]
    stable: bool,
}

#[derive(Debug, Deserialize)]
struct PaperBuilds {
    builds: Vec<PaperBuild>,
}

#[derive(Debug, Deserialize)]
struct PaperBuild {
    build: u32,
    downloads: PaperDownloads,
}

#[derive(Debug, Deserialize)]
struct PaperDownloads {
    application: PaperDownload,
}

#[derive(Debug, Deserialize)]
struct PaperDownload {
    name: String,
}

/// Newest stable installer, else the newest one. The meta service lists
/// newest first.
fn pick_installer(installers: &[FabricVersion]) -> Option<&FabricVersion> {
    installers
        .iter()
        .find(|i| i.stable)
        .or_else(|| installers.first())
}

/// Fabric launcher URL for a version triple.
fn fabric_jar_url(base: &str, game_version: &str, loader: &str, installer: &str) -> String {
    format!("{base}/v2/versions/loader/{game_version}/{loader}/{installer}/server/jar")
}

/// Download URL of the newest Paper build.
fn paper_jar_url(base: &str, game_version: &str, builds: &PaperBuilds) -> Option<String> {
    builds.builds.iter().max_by_key(|b| b.build).map(|b| {
        format!(
            "{base}/v2/projects/paper/versions/{game_version}/builds/{}/downloads/{}",
            b.build, b.downloads.application.name
        )
    })
}

/// [`LauncherLocator`] querying the Fabric meta and Paper APIs.
#[derive(Debug, Clone)]
pub struct HttpLauncherLocator {
    client: Client,
    fabric_url: String,
    paper_url: String,
}

impl HttpLauncherLocator {
    /// Creates a locator against the public Fabric and Paper services.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_endpoints(FABRIC_META_URL, PAPER_API_URL, timeout)
    }

    /// Creates a locator against custom service endpoints.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the HTTP client cannot be built.
    pub fn with_endpoints(
        fabric_url: impl Into<String>,
        paper_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ModdockError::Config {
                message: format!("failed to build launcher client: {e}"),
            })?;
        Ok(Self {
            client,
            fabric_url: fabric_url.into().trim_end_matches('/').to_string(),
            paper_url: paper_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        debug!(url, "launcher request");
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ModdockError::external(SERVICE, format!("request to {url} timed out"))
            } else {
                ModdockError::external(SERVICE, format!("request to {url} failed: {e}"))
            }
        })?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ModdockError::external(SERVICE, format!("{url} answered {status}")));
        }
        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| ModdockError::external(SERVICE, format!("malformed response from {url}: {e}")))
    }

    async fn fabric(&self, game_version: &str) -> Result<String> {
        let missing = || ModdockError::not_found("launcher", format!("fabric {game_version}"));
        let loaders: Vec<FabricLoaderEntry> = self
            .get_json(&format!("{}/v2/versions/loader/{game_version}", self.fabric_url))
            .await?
            .unwrap_or_default();
        let loader = loaders.first().ok_or_else(missing)?.loader.version.clone();

        let installers: Vec<FabricVersion> = self
            .get_json(&format!("{}/v2/versions/installer", self.fabric_url))
            .await?
            .unwrap_or_default();
        let installer = pick_installer(&installers).ok_or_else(missing)?;

        Ok(fabric_jar_url(
            &self.fabric_url,
            game_version,
            &loader,
            &installer.version,
        ))
    }

    async fn paper(&self, game_version: &str) -> Result<String> {
        let builds: Option<PaperBuilds> = self
            .get_json(&format!(
                "{}/v2/projects/paper/versions/{game_version}/builds",
                self.paper_url
            ))
            .await?;
        builds
            .and_then(|b| paper_jar_url(&self.paper_url, game_version, &b))
            .ok_or_else(|| ModdockError::not_found("launcher", format!("paper {game_version}")))
    }
}

#[async_trait]
impl LauncherLocator for HttpLauncherLocator {
    #[instrument(skip(self))]
    async fn launcher_url(&self, loader: Loader, game_version: &str) -> Result<String> {
        let url = match loader {
            Loader::Fabric => self.fabric(game_version).await?,
            Loader::Paper => self.paper(game_version).await?,
        };
        debug!(%loader, game_version, %url, "launcher located");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use moddock_common::error::ErrorKind;

    use super::*;

    fn installer(version: &str, stable: bool) -> FabricVersion {
        FabricVersion {
            version: version.into(),
            stable,
        }
    }

    #[test]
    fn newest_stable_installer_wins() {
        let installers = [
            installer("1.0.2", false),
            installer("1.0.1", true),
            installer("1.0.0", true),
        ];
        assert_eq!(pick_installer(&installers).unwrap().version, "1.0.1");
    }

    #[test]
    fn unstable_installer_is_the_fallback() {
        let installers = [installer("0.9.0", false)];
        assert_eq!(pick_installer(&installers).unwrap().version, "0.9.0");
        assert!(pick_installer(&[]).is_none());
    }

    #[test]
    fn fabric_url_embeds_all_three_versions() {
        assert_eq!(
            fabric_jar_url("https://meta.fabricmc.net", "1.20.1", "0.15.11", "1.0.1"),
            "https://meta.fabricmc.net/v2/versions/loader/1.20.1/0.15.11/1.0.1/server/jar"
        );
    }

    #[test]
    fn fabric_loader_listing_parses() {
        let body = r#"[{"loader":{"version":"0.15.11","stable":true},"intermediary":{}}]"#;
        let entries: Vec<FabricLoaderEntry> = serde_json::from_str(body).expect("parse");
        assert_eq!(entries[0].loader.version, "0.15.11");
    }

    #[test]
    fn newest_paper_build_is_chosen() {
        let body = r#"{"builds":[
            {"build":100,"downloads":{"application":{"name":"paper-1.20.1-100.jar"}}},
            {"build":196,"downloads":{"application":{"name":"paper-1.20.1-196.jar"}}},
            {"build":150,"downloads":{"application":{"name":"paper-1.20.1-150.jar"}}}
        ]}"#;
        let builds: PaperBuilds = serde_json::from_str(body).expect("parse");
        assert_eq!(
            paper_jar_url("https://api.papermc.io", "1.20.1", &builds).unwrap(),
            "https://api.papermc.io/v2/projects/paper/versions/1.20.1/builds/196/downloads/paper-1.20.1-196.jar"
        );
        assert!(paper_jar_url("x", "1.20.1", &PaperBuilds { builds: vec![] }).is_none());
    }

    #[tokio::test]
    async fn unreachable_service_is_an_external_service_error() {
        let locator = HttpLauncherLocator::with_endpoints(
            "http://127.0.0.1:9",
            "http://127.0.0.1:9",
            Duration::from_secs(2),
        )
        .expect("client");
        let err = locator.launcher_url(Loader::Paper, "1.20.1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalService);
    }
}
