//! Fluent API for wiring a [`Provisioner`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use moddock_common::config::ModdockConfig;
use moddock_common::constants::ENGINE_TIMEOUT_SECS;
use moddock_common::error::Result;
use moddock_image::{HttpLauncherLocator, LauncherLocator};
use moddock_registry::{HttpRegistry, ModRegistry};
use moddock_runtime::backend::{ContainerEngine, DockerEngine};
use moddock_store::Store;

use crate::provisioner::Provisioner;

/// Builder for a [`Provisioner`].
///
/// Services left unset are created from the configuration: the HTTP
/// registry client, the Docker engine, and the public launcher services.
pub struct ProvisionerBuilder {
    config: ModdockConfig,
    registry: Option<Arc<dyn ModRegistry>>,
    engine: Option<Arc<dyn ContainerEngine>>,
    launcher: Option<Arc<dyn LauncherLocator>>,
}

impl fmt::Debug for ProvisionerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionerBuilder")
            .field("config", &self.config)
            .field("registry", &self.registry.is_some())
            .field("engine", &self.engine.is_some())
            .field("launcher", &self.launcher.is_some())
            .finish()
    }
}

impl ProvisionerBuilder {
    /// Creates a builder over `config`.
    #[must_use]
    pub fn new(config: ModdockConfig) -> Self {
        Self {
            config,
            registry: None,
            engine: None,
            launcher: None,
        }
    }

    /// Uses `registry` instead of the HTTP client.
    #[must_use]
    pub fn registry(mut self, registry: Arc<dyn ModRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Uses `engine` instead of connecting to Docker.
    #[must_use]
    pub fn engine(mut self, engine: Arc<dyn ContainerEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Uses `launcher` instead of the public launcher services.
    #[must_use]
    pub fn launcher(mut self, launcher: Arc<dyn LauncherLocator>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Opens the store and assembles the provisioner.
    ///
    /// # Errors
    ///
    /// Returns `Config` for invalid configuration or an unbuildable HTTP
    /// client, `ExternalService` for a malformed engine endpoint, or an
    /// error if the store file cannot be read.
    pub fn build(self) -> Result<Provisioner> {
        self.config.validate()?;
        let timeout = Duration::from_secs(self.config.request_timeout_secs);

        let registry = match self.registry {
            Some(registry) => registry,
            None => Arc::new(HttpRegistry::from_config(&self.config)?),
        };
        let engine = match self.engine {
            Some(engine) => engine,
            None => Arc::new(DockerEngine::connect(
                self.config.engine_endpoint.as_deref(),
                ENGINE_TIMEOUT_SECS,
            )?),
        };
        let launcher = match self.launcher {
            Some(launcher) => launcher,
            None => Arc::new(HttpLauncherLocator::new(timeout)?),
        };
        let store = Store::open(self.config.store_file())?;

        tracing::debug!(
            store = %store.path().display(),
            storage_root = %self.config.storage_root.display(),
            "provisioner ready"
        );
        Ok(Provisioner::new(
            &self.config,
            store,
            registry,
            engine,
            launcher,
        ))
    }
}
