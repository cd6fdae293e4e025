//! Server container lifecycle.
//!
//! A server maps to at most one container, found by the name
//! `<loader>-<server_id>` and never by a stored id. Start and stop are
//! decided from the status the engine reports at call time:
//!
//! | status                      | start            | stop             |
//! |-----------------------------|------------------|------------------|
//! | absent                      | create + start   | not found        |
//! | created                     | start            | never started    |
//! | exited                      | start            | already exited   |
//! | paused                      | unpause          | stop             |
//! | running, restarting         | no-op            | stop             |
//! | dead, removing              | error            | error            |
//!
//! Nothing here removes or recreates a container.

use std::fmt;
use std::sync::Arc;

use moddock_common::constants::{CONTAINER_GAME_PORT, CONTAINER_WORKDIR, STOP_TIMEOUT_SECS};
use moddock_common::error::{ModdockError, Result};
use moddock_common::settings::ServerSettings;
use moddock_common::storage::{MODS_DIR, StorageLayout, WORLD_DIR};
use moddock_common::types::{ContainerId, Loader, ServerId, container_name};

use crate::backend::{ContainerEngine, ContainerSpec, MountSpec};
use crate::state::ContainerStatus;

/// Result of starting a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// No container existed; one was created and started.
    Created {
        /// New container id.
        id: ContainerId,
    },
    /// An existing stopped or paused container was resumed.
    Started {
        /// Container id.
        id: ContainerId,
    },
    /// The container was already running.
    AlreadyRunning {
        /// Container id.
        id: ContainerId,
    },
}

impl StartOutcome {
    /// Id of the container concerned.
    #[must_use]
    pub const fn id(&self) -> &ContainerId {
        match self {
            Self::Created { id } | Self::Started { id } | Self::AlreadyRunning { id } => id,
        }
    }
}

impl fmt::Display for StartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created { id } => write!(f, "created and started container {id}"),
            Self::Started { id } => write!(f, "started container {id}"),
            Self::AlreadyRunning { id } => write!(f, "container {id} is already running"),
        }
    }
}

/// Result of stopping a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The container was stopped.
    Stopped {
        /// Container id.
        id: ContainerId,
        /// Status reported after the stop.
        status: ContainerStatus,
    },
    /// The container had already exited.
    AlreadyExited {
        /// Container id.
        id: ContainerId,
    },
    /// The container was created but never started.
    NeverStarted {
        /// Container id.
        id: ContainerId,
    },
}

impl StopOutcome {
    /// Id of the container concerned.
    #[must_use]
    pub const fn id(&self) -> &ContainerId {
        match self {
            Self::Stopped { id, .. } | Self::AlreadyExited { id } | Self::NeverStarted { id } => {
                id
            }
        }
    }
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped { id, status } => write!(f, "stopped container {id} ({status})"),
            Self::AlreadyExited { id } => write!(f, "container {id} has already exited"),
            Self::NeverStarted { id } => write!(f, "container {id} was never started"),
        }
    }
}

/// Starts and stops server containers.
pub struct LifecycleManager {
    engine: Arc<dyn ContainerEngine>,
    layout: StorageLayout,
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl LifecycleManager {
    /// Creates a manager driving `engine`, with server directories under
    /// `layout`.
    #[must_use]
    pub fn new(engine: Arc<dyn ContainerEngine>, layout: StorageLayout) -> Self {
        Self { engine, layout }
    }

    /// Builds the container spec for a server.
    ///
    /// Mount sources are host paths, so they follow the layout's host root.
    #[must_use]
    pub fn container_spec(&self, server_id: &ServerId, settings: &ServerSettings) -> ContainerSpec {
        let name = container_name(settings.loader, server_id);
        let host_dir = self.layout.host_server_dir(server_id);
        ContainerSpec {
            image: name.clone(),
            name,
            container_port: CONTAINER_GAME_PORT.to_string(),
            host_port: settings.port,
            mounts: [WORLD_DIR, MODS_DIR]
                .into_iter()
                .map(|dir| MountSpec {
                    source: host_dir.join(dir),
                    target: format!("{CONTAINER_WORKDIR}/{dir}"),
                })
                .collect(),
            env: vec![format!("ALLOCATED_RAM={}M", settings.allocated_memory_mb)],
        }
    }

    /// Brings a server's container to running.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no container exists and the image has not been
    /// built, `ContainerState` if the container is dead or being removed,
    /// or `ExternalService` on engine failures.
    pub async fn start_server(
        &self,
        server_id: &ServerId,
        settings: &ServerSettings,
    ) -> Result<StartOutcome> {
        let name = container_name(settings.loader, server_id);
        let Some(snapshot) = self.engine.inspect_container(&name).await? else {
            if self.engine.image_id(&name).await?.is_none() {
                return Err(ModdockError::not_found("image", &name));
            }
            let spec = self.container_spec(server_id, settings);
            let id = self.engine.create_container(&spec).await?;
            tracing::info!(server_id = %server_id, container = %name, id = %id, "container created");
            return Ok(StartOutcome::Created { id });
        };

        let id = snapshot.id;
        match snapshot.status {
            status if status.is_unusable() => Err(unusable(&name, status)),
            ContainerStatus::Paused => {
                self.engine.unpause_container(&name).await?;
                tracing::info!(server_id = %server_id, container = %name, "container unpaused");
                Ok(StartOutcome::Started { id })
            }
            ContainerStatus::Running | ContainerStatus::Restarting => {
                Ok(StartOutcome::AlreadyRunning { id })
            }
            _ => {
                self.engine.start_container(&name).await?;
                tracing::info!(server_id = %server_id, container = %name, "container started");
                Ok(StartOutcome::Started { id })
            }
        }
    }

    /// Brings a server's container to stopped.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no container exists, `ContainerState` if it is
    /// dead or being removed, or `ExternalService` on engine failures.
    pub async fn stop_server(&self, server_id: &ServerId, loader: Loader) -> Result<StopOutcome> {
        let name = container_name(loader, server_id);
        let snapshot = self
            .engine
            .inspect_container(&name)
            .await?
            .ok_or_else(|| ModdockError::not_found("container", &name))?;

        let id = snapshot.id;
        match snapshot.status {
            status if status.is_unusable() => Err(unusable(&name, status)),
            status if status.is_active() => {
                self.engine.stop_container(&name, STOP_TIMEOUT_SECS).await?;
                let status = self
                    .engine
                    .inspect_container(&name)
                    .await?
                    .ok_or_else(|| ModdockError::not_found("container", &name))?
                    .status;
                tracing::info!(server_id = %server_id, container = %name, %status, "container stopped");
                Ok(StopOutcome::Stopped { id, status })
            }
            ContainerStatus::Created => Ok(StopOutcome::NeverStarted { id }),
            _ => Ok(StopOutcome::AlreadyExited { id }),
        }
    }

    /// Current status of a server's container, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ExternalService` on engine failures.
    pub async fn status(&self, server_id: &ServerId, loader: Loader) -> Result<Option<ContainerStatus>> {
        let name = container_name(loader, server_id);
        Ok(self.engine.inspect_container(&name).await?.map(|s| s.status))
    }
}

fn unusable(name: &str, status: ContainerStatus) -> ModdockError {
    ModdockError::ContainerState {
        container: name.to_string(),
        state: status.to_string(),
        message: "the container cannot be used any more; rebuild the server".into(),
    }
}
