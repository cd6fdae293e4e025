//! The provisioning pipeline.
//!
//! A server moves through resolve (attach a playset or add mods), build,
//! and start/stop. Pipeline operations on one server run one at a time;
//! different servers proceed in parallel. Playset management does not
//! touch servers and is not serialized.

use std::fmt;
use std::sync::Arc;

use moddock_common::config::ModdockConfig;
use moddock_common::error::{ModdockError, Result};
use moddock_common::settings::{ServerBuildSettings, ServerSettings};
use moddock_common::storage::StorageLayout;
use moddock_common::types::{Loader, PlaysetId, ProjectId, ResolvedMod, ServerId, container_name};
use moddock_image::{ImageBuilder, LauncherLocator, compile};
use moddock_registry::client::ensure_all_found;
use moddock_registry::{ModRegistry, Project, VersionSelector};
use moddock_resolve::Resolver;
use moddock_runtime::backend::ContainerEngine;
use moddock_runtime::{ContainerStatus, LifecycleManager, StartOutcome, StopOutcome};
use moddock_store::{ModRecord, Playset, Server, Store};

use crate::locks::ServerLocks;

/// A server with its resolved mods and container status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDetails {
    /// Stored server record.
    pub server: Server,
    /// Resolved mods, by role then project id.
    pub mods: Vec<ResolvedMod>,
    /// Container status, `None` when no container exists.
    pub status: Option<ContainerStatus>,
}

/// Outcome of a successful image build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Image name, `<loader>-<server_id>`.
    pub image: String,
    /// SHA-256 digest of the build descriptor.
    pub digest: String,
    /// Number of mods baked into the image.
    pub mods: usize,
}

/// Orchestrates the store, the registry, image builds, and containers.
pub struct Provisioner {
    store: Store,
    registry: Arc<dyn ModRegistry>,
    resolver: Resolver,
    launcher: Arc<dyn LauncherLocator>,
    engine: Arc<dyn ContainerEngine>,
    images: ImageBuilder,
    lifecycle: LifecycleManager,
    layout: StorageLayout,
    locks: ServerLocks,
}

impl fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provisioner")
            .field("store", &self.store.path())
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl Provisioner {
    /// Assembles a provisioner from its services.
    ///
    /// Prefer [`ProvisionerBuilder`](crate::builder::ProvisionerBuilder),
    /// which fills in the default services.
    #[must_use]
    pub fn new(
        config: &ModdockConfig,
        store: Store,
        registry: Arc<dyn ModRegistry>,
        engine: Arc<dyn ContainerEngine>,
        launcher: Arc<dyn LauncherLocator>,
    ) -> Self {
        let layout = config.storage_layout();
        let selector = VersionSelector::new(Arc::clone(&registry), config.selection_policy);
        Self {
            store,
            registry,
            resolver: Resolver::new(selector),
            launcher,
            images: ImageBuilder::new(Arc::clone(&engine)),
            lifecycle: LifecycleManager::new(Arc::clone(&engine), layout.clone()),
            engine,
            layout,
            locks: ServerLocks::new(config.locks_dir()),
        }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    // Servers

    /// Creates a server and its storage directory.
    ///
    /// # Errors
    ///
    /// Returns `Config` for invalid settings, or an error if the store or
    /// the directory cannot be written.
    pub fn create_server(&self, name: impl Into<String>, settings: ServerSettings) -> Result<Server> {
        let server = self.store.create_server(name, settings)?;
        if let Err(e) = self.layout.ensure_server_dirs(&server.id) {
            if let Err(rollback) = self.store.delete_server(&server.id) {
                tracing::warn!(server_id = %server.id, error = %rollback, "failed to roll back server");
            }
            return Err(e);
        }
        Ok(server)
    }

    /// Lists servers, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn list_servers(&self) -> Result<Vec<Server>> {
        self.store.list_servers()
    }

    /// A server with its resolved mods and container status.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown server, or `ExternalService` if the
    /// engine cannot be queried.
    pub async fn server(&self, server_id: &ServerId) -> Result<ServerDetails> {
        let server = self.store.get_server(server_id)?;
        let mods = self.store.server_mods(server_id)?;
        let status = self.lifecycle.status(server_id, server.settings.loader).await?;
        Ok(ServerDetails {
            server,
            mods,
            status,
        })
    }

    /// Replaces a server's settings.
    ///
    /// Changing the loader or game version drops the resolved mods. A
    /// loader change also renames the container, so it is refused while
    /// the old container is active; a stopped one is removed along with
    /// its image.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown server, `Config` for invalid
    /// settings, `ContainerState` if the server must be stopped first, or
    /// `ExternalService` on engine failures.
    pub async fn update_settings(&self, server_id: &ServerId, settings: ServerSettings) -> Result<Server> {
        let _guard = self.locks.acquire(server_id).await?;
        let current = self.store.get_server(server_id)?;
        settings.validate()?;

        let old_loader = current.settings.loader;
        if settings.loader != old_loader {
            let name = container_name(old_loader, server_id);
            let status = self.lifecycle.status(server_id, old_loader).await?;
            if let Some(status) = status.filter(|s| s.is_active()) {
                return Err(ModdockError::ContainerState {
                    container: name,
                    state: status.to_string(),
                    message: "stop the server before changing its loader".into(),
                });
            }
            self.remove_artifacts(server_id, old_loader).await?;
        }

        self.store.update_settings(server_id, settings)
    }

    /// Resolves a playset's mods for a server and records them.
    ///
    /// Mods the server already has are kept and not queried again. The
    /// playset becomes the server's attached playset.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown server or playset, or if a mod or
    /// dependency has no compatible version; nothing is recorded then.
    /// Returns `ExternalService` on registry failures.
    pub async fn attach_playset(&self, server_id: &ServerId, playset_id: &PlaysetId) -> Result<Vec<ResolvedMod>> {
        let _guard = self.locks.acquire(server_id).await?;
        let server = self.store.get_server(server_id)?;
        let requested = self.store.playset_project_ids(playset_id)?;
        let added = self.resolve_into(&server, &requested).await?;
        self.store.set_server_playset(server_id, playset_id)?;
        tracing::info!(server_id = %server_id, playset_id = %playset_id, added = added.len(), "playset attached");
        Ok(added)
    }

    /// Resolves individual mods for a server and records them.
    ///
    /// # Errors
    ///
    /// Same as [`Self::attach_playset`].
    pub async fn add_mods(&self, server_id: &ServerId, project_ids: &[ProjectId]) -> Result<Vec<ResolvedMod>> {
        let _guard = self.locks.acquire(server_id).await?;
        let server = self.store.get_server(server_id)?;
        let added = self.resolve_into(&server, project_ids).await?;
        tracing::info!(server_id = %server_id, added = added.len(), "mods added");
        Ok(added)
    }

    async fn resolve_into(&self, server: &Server, requested: &[ProjectId]) -> Result<Vec<ResolvedMod>> {
        let known = self.store.known_project_ids(&server.id)?;
        let resolution = self
            .resolver
            .resolve_from(
                server.settings.loader,
                &server.settings.game_version,
                requested,
                &known,
            )
            .await?;
        self.store.record_resolution(&server.id, &resolution.mods)
    }

    /// Compiles the build descriptor into the server directory and builds
    /// the image.
    ///
    /// An existing container keeps running its old image until it is
    /// removed with [`Self::remove_container`] and started again.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown server or a missing launcher,
    /// `Config` for a game version without a known runtime, `BuildFailure`
    /// with the build log tail, or `ExternalService` on transport failures.
    pub async fn build(&self, server_id: &ServerId) -> Result<BuildReport> {
        let _guard = self.locks.acquire(server_id).await?;
        let server = self.store.get_server(server_id)?;
        let mods = self.store.server_mods(server_id)?;

        let launcher_url = self
            .launcher
            .launcher_url(server.settings.loader, &server.settings.game_version)
            .await?;
        let settings = ServerBuildSettings::new(
            server.id.clone(),
            server.name.clone(),
            &server.settings,
            launcher_url,
        );
        let descriptor = compile(&settings, &mods)?;
        let dir = self.layout.ensure_server_dirs(server_id)?;
        descriptor.write_to(&dir)?;
        tracing::debug!(server_id = %server_id, digest = descriptor.digest(), dir = %dir.display(), "descriptor written");

        let image = self.images.build(&settings, &dir).await?;
        Ok(BuildReport {
            image,
            digest: descriptor.digest().to_string(),
            mods: mods.len(),
        })
    }

    /// Brings a server's container to running.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown server or an unbuilt image,
    /// `ContainerState` for a dead container, or `ExternalService` on
    /// engine failures.
    pub async fn start(&self, server_id: &ServerId) -> Result<StartOutcome> {
        let _guard = self.locks.acquire(server_id).await?;
        let server = self.store.get_server(server_id)?;
        self.lifecycle.start_server(server_id, &server.settings).await
    }

    /// Brings a server's container to stopped.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown server or a missing container,
    /// `ContainerState` for a dead container, or `ExternalService` on
    /// engine failures.
    pub async fn stop(&self, server_id: &ServerId) -> Result<StopOutcome> {
        let _guard = self.locks.acquire(server_id).await?;
        let server = self.store.get_server(server_id)?;
        self.lifecycle.stop_server(server_id, server.settings.loader).await
    }

    /// Removes a server's stopped container, keeping its image and world.
    ///
    /// Returns whether a container was removed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown server, `ContainerState` if the
    /// container is active, or `ExternalService` on engine failures.
    pub async fn remove_container(&self, server_id: &ServerId) -> Result<bool> {
        let _guard = self.locks.acquire(server_id).await?;
        let server = self.store.get_server(server_id)?;
        let loader = server.settings.loader;
        let name = container_name(loader, server_id);
        match self.lifecycle.status(server_id, loader).await? {
            None => Ok(false),
            Some(status) if status.is_active() => Err(ModdockError::ContainerState {
                container: name,
                state: status.to_string(),
                message: "stop the server before removing its container".into(),
            }),
            Some(_) => {
                let removed = self.engine.remove_container(&name, false).await?;
                tracing::info!(server_id = %server_id, container = %name, "container removed");
                Ok(removed)
            }
        }
    }

    /// Deletes a server: its container (forced), its image, its storage
    /// directory including the world, and its records.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown server, `ExternalService` if the
    /// container cannot be removed, or an error if the directory or store
    /// cannot be written.
    pub async fn delete_server(&self, server_id: &ServerId) -> Result<()> {
        let guard = self.locks.acquire(server_id).await?;
        let _ = self.store.get_server(server_id)?;
        for loader in Loader::ALL {
            self.remove_artifacts(server_id, loader).await?;
        }
        self.layout.remove_server_dir(server_id)?;
        self.store.delete_server(server_id)?;
        drop(guard);
        self.locks.forget(server_id);
        Ok(())
    }

    /// Force-removes the container and, best effort, the image a server has
    /// under `loader`.
    async fn remove_artifacts(&self, server_id: &ServerId, loader: Loader) -> Result<()> {
        let name = container_name(loader, server_id);
        if self.engine.remove_container(&name, true).await? {
            tracing::info!(server_id = %server_id, container = %name, "container removed");
        }
        match self.engine.remove_image(&name).await {
            Ok(true) => tracing::info!(server_id = %server_id, image = %name, "image removed"),
            Ok(false) => {}
            Err(e) => tracing::warn!(server_id = %server_id, image = %name, error = %e, "failed to remove image"),
        }
        Ok(())
    }

    // Playsets

    /// Creates an empty playset.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn create_playset(&self, name: impl Into<String>) -> Result<Playset> {
        self.store.create_playset(name)
    }

    /// Lists playsets, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn list_playsets(&self) -> Result<Vec<Playset>> {
        self.store.list_playsets()
    }

    /// A playset and its mods.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown playset.
    pub fn playset(&self, playset_id: &PlaysetId) -> Result<(Playset, Vec<ModRecord>)> {
        let playset = self.store.get_playset(playset_id)?;
        let mods = self.store.playset_mods(playset_id)?;
        Ok((playset, mods))
    }

    /// Adds registry projects to a playset and returns how many were newly
    /// linked.
    ///
    /// Every id is checked against the registry first; nothing is added if
    /// any is unknown or is not a mod.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown playset or project, `Config` for a
    /// project that is not a mod, or `ExternalService` on registry failures.
    pub async fn add_mods_to_playset(&self, playset_id: &PlaysetId, project_ids: &[ProjectId]) -> Result<usize> {
        let _ = self.store.get_playset(playset_id)?;
        if project_ids.is_empty() {
            return Ok(0);
        }
        let projects = self.registry.projects(project_ids).await?;
        ensure_all_found(project_ids, &projects)?;
        if let Some(project) = projects.iter().find(|p| !p.is_mod()) {
            return Err(ModdockError::Config {
                message: format!(
                    "{} ({}) is a {}, not a mod",
                    project.title, project.id, project.project_type
                ),
            });
        }
        self.link(playset_id, projects)
    }

    /// Adds the mods of a registry collection to a playset and returns how
    /// many were newly linked. Projects that are not mods are skipped.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown playset or collection, or
    /// `ExternalService` on registry failures.
    pub async fn add_collection_to_playset(&self, playset_id: &PlaysetId, collection_id: &str) -> Result<usize> {
        let _ = self.store.get_playset(playset_id)?;
        let collection = self.registry.collection(collection_id).await?;
        if collection.projects.is_empty() {
            return Ok(0);
        }
        let projects = self.registry.projects(&collection.projects).await?;
        let (mods, skipped): (Vec<Project>, Vec<Project>) = projects.into_iter().partition(Project::is_mod);
        for project in &skipped {
            tracing::warn!(collection = collection_id, project = %project.id, project_type = %project.project_type, "skipping non-mod project");
        }
        self.link(playset_id, mods)
    }

    fn link(&self, playset_id: &PlaysetId, projects: Vec<Project>) -> Result<usize> {
        let records: Vec<ModRecord> = projects
            .into_iter()
            .map(|p| ModRecord {
                project_id: p.id,
                title: p.title,
            })
            .collect();
        self.store.add_mods_to_playset(playset_id, &records)
    }

    /// Removes a mod from a playset.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the playset does not contain the mod.
    pub fn remove_mod_from_playset(&self, playset_id: &PlaysetId, project_id: &ProjectId) -> Result<()> {
        self.store.remove_mod_from_playset(playset_id, project_id)
    }

    /// Deletes a playset and returns how many orphaned mods were collected.
    ///
    /// Servers it was attached to keep their resolved mods.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown playset.
    pub fn delete_playset(&self, playset_id: &PlaysetId) -> Result<usize> {
        self.store.delete_playset(playset_id)
    }
}
