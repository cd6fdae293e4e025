//! Registry access capability and its HTTP implementation.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use moddock_common::error::{ModdockError, Result};
use moddock_common::types::{ProjectId, VersionId};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::limiter::RateLimiter;
use crate::models::{Collection, Project, Version};

const SERVICE: &str = "registry";

/// Read-only access to the mod registry.
///
/// Implemented over HTTP by [`HttpRegistry`]; tests substitute in-memory
/// fakes.
#[async_trait]
pub trait ModRegistry: Send + Sync {
    /// Fetches several projects at once.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` listing every id the registry does not know, or
    /// `ExternalService` on transport failures.
    async fn projects(&self, ids: &[ProjectId]) -> Result<Vec<Project>>;

    /// Lists the versions of a project that support any of `game_versions`,
    /// in registry order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project is unknown, or `ExternalService` on
    /// transport failures.
    async fn project_versions(&self, id: &ProjectId, game_versions: &[String])
    -> Result<Vec<Version>>;

    /// Fetches several versions by id.
    ///
    /// # Errors
    ///
    /// Returns `ExternalService` on transport failures.
    async fn versions(&self, ids: &[VersionId]) -> Result<Vec<Version>>;

    /// Fetches a collection.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the collection is unknown, or `ExternalService`
    /// on transport failures.
    async fn collection(&self, id: &str) -> Result<Collection>;
}

/// Fails with `NotFound` naming every requested id missing from `found`.
///
/// # Errors
///
/// Returns `ModdockError::NotFound` if any id is missing.
pub fn ensure_all_found(requested: &[ProjectId], found: &[Project]) -> Result<()> {
    let located: HashSet<&ProjectId> = found.iter().map(|p| &p.id).collect();
    let missing: Vec<&str> = requested
        .iter()
        .filter(|id| !located.contains(id))
        .map(ProjectId::as_str)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ModdockError::not_found("project", missing.join(", ")))
    }
}

/// HTTP client for a Modrinth-compatible registry.
#[derive(Debug)]
pub struct HttpRegistry {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
}

impl HttpRegistry {
    /// Creates a client for the registry at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ModdockError::Config` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration, limiter: RateLimiter) -> Result<Self> {
        let client = Client::builder()
            .user_agent(moddock_common::constants::USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ModdockError::Config {
                message: format!("failed to build registry client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limiter,
        })
    }

    /// Creates a client from the workspace configuration.
    ///
    /// # Errors
    ///
    /// Returns `ModdockError::Config` if the HTTP client cannot be built.
    pub fn from_config(config: &moddock_common::config::ModdockConfig) -> Result<Self> {
        Self::new(
            config.registry_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
            RateLimiter::new(config.registry_requests_per_minute, config.registry_burst),
        )
    }

    /// Issues a throttled GET and decodes the body. `Ok(None)` means 404.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        self.limiter.acquire().await;
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "registry request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(&url, &e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModdockError::external(
                SERVICE,
                format!("{url} answered {status}: {body}"),
            ));
        }
        let value = response
            .json::<T>()
            .await
            .map_err(|e| ModdockError::external(SERVICE, format!("malformed response from {url}: {e}")))?;
        Ok(Some(value))
    }
}

fn transport_error(url: &str, err: &reqwest::Error) -> ModdockError {
    if err.is_timeout() {
        ModdockError::external(SERVICE, format!("request to {url} timed out"))
    } else {
        ModdockError::external(SERVICE, format!("request to {url} failed: {err}"))
    }
}

/// Encodes ids the way the registry expects list parameters: a JSON array.
fn json_list<T: serde::Serialize>(items: &[T]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

#[async_trait]
impl ModRegistry for HttpRegistry {
    #[instrument(skip(self))]
    async fn projects(&self, ids: &[ProjectId]) -> Result<Vec<Project>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let projects: Vec<Project> = self
            .get_json("/v2/projects", &[("ids", json_list(ids)?)])
            .await?
            .unwrap_or_default();
        ensure_all_found(ids, &projects)?;
        Ok(projects)
    }

    #[instrument(skip(self))]
    async fn project_versions(
        &self,
        id: &ProjectId,
        game_versions: &[String],
    ) -> Result<Vec<Version>> {
        self.get_json(
            &format!("/v2/project/{id}/version"),
            &[("game_versions", json_list(game_versions)?)],
        )
        .await?
        .ok_or_else(|| ModdockError::not_found("project", id))
    }

    #[instrument(skip(self))]
    async fn versions(&self, ids: &[VersionId]) -> Result<Vec<Version>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .get_json("/v2/versions", &[("ids", json_list(ids)?)])
            .await?
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn collection(&self, id: &str) -> Result<Collection> {
        self.get_json(&format!("/v3/collection/{id}"), &[])
            .await?
            .ok_or_else(|| ModdockError::not_found("collection", id))
    }
}

#[cfg(test)]
mod tests {
    use moddock_common::error::ErrorKind;

    use super::*;

    fn project(id: &str) -> Project {
        Project {
            id: ProjectId::new(id),
            title: id.to_uppercase(),
            project_type: "mod".into(),
        }
    }

    #[test]
    fn ensure_all_found_accepts_complete_answer() {
        let ids = [ProjectId::new("a"), ProjectId::new("b")];
        ensure_all_found(&ids, &[project("b"), project("a")]).expect("all found");
    }

    #[test]
    fn ensure_all_found_lists_every_missing_id() {
        let ids = [ProjectId::new("a"), ProjectId::new("b"), ProjectId::new("c")];
        let err = ensure_all_found(&ids, &[project("b")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let msg = err.to_string();
        assert!(msg.contains("a, c"), "got: {msg}");
    }

    #[test]
    fn json_list_quotes_every_entry() {
        let encoded = json_list(&["1.20.1".to_string()]).expect("encode");
        assert_eq!(encoded, r#"["1.20.1"]"#);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let registry = HttpRegistry::new(
            "https://api.example.com/",
            Duration::from_secs(5),
            RateLimiter::new(60, 1),
        )
        .expect("client");
        assert_eq!(registry.base_url, "https://api.example.com");
    }

    #[tokio::test]
    async fn unreachable_registry_is_an_external_service_error() {
        let registry = HttpRegistry::new(
            "http://127.0.0.1:9",
            Duration::from_secs(2),
            RateLimiter::new(600, 10),
        )
        .expect("client");
        let err = registry.projects(&[ProjectId::new("x")]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalService);
    }
}
