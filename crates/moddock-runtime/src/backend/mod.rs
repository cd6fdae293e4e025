//! Container engine abstraction.

pub mod docker;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use moddock_common::error::Result;
use moddock_common::types::ContainerId;

use crate::state::ContainerStatus;

pub use docker::DockerEngine;

/// Captured result of an image build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    /// Log lines streamed by the engine, in order.
    pub log: Vec<String>,
    /// Structured error reported by the engine, if any.
    pub error: Option<String>,
}

/// A container as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSnapshot {
    /// Engine-assigned id.
    pub id: ContainerId,
    /// Current status.
    pub status: ContainerStatus,
}

/// A host directory bind-mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    /// Path on the engine host.
    pub source: PathBuf,
    /// Path inside the container.
    pub target: String,
}

/// Everything needed to create a server container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Image to run.
    pub image: String,
    /// Container port, e.g. `25565/tcp`.
    pub container_port: String,
    /// Host port the container port is published on.
    pub host_port: u16,
    /// Bind mounts, propagated `rshared`.
    pub mounts: Vec<MountSpec>,
    /// Environment as `KEY=value` entries.
    pub env: Vec<String>,
}

/// Operations the pipeline needs from a container engine.
///
/// Containers and images are addressed by name. Implemented over the Docker
/// API by [`DockerEngine`]; tests substitute in-memory fakes.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Builds an image tagged `tag` from the descriptor in `context`.
    ///
    /// A build the engine ran but rejected is reported through
    /// [`BuildOutput::error`], not as `Err`.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the context cannot be packed, or `ExternalService`
    /// if the engine cannot be reached.
    async fn build_image(&self, context: &Path, tag: &str) -> Result<BuildOutput>;

    /// Removes an image. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns `ExternalService` if the engine fails.
    async fn remove_image(&self, tag: &str) -> Result<bool>;

    /// Id of the image `tag` currently points at, `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns `ExternalService` if the engine fails.
    async fn image_id(&self, tag: &str) -> Result<Option<String>>;

    /// Looks up a container by name. `None` means it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ExternalService` if the engine fails.
    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerSnapshot>>;

    /// Creates a container and starts it.
    ///
    /// # Errors
    ///
    /// Returns `ExternalService` if creation or start fails.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId>;

    /// Starts a created or exited container.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the container does not exist, or
    /// `ExternalService` if the engine fails.
    async fn start_container(&self, name: &str) -> Result<()>;

    /// Resumes a paused container.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the container does not exist, or
    /// `ExternalService` if the engine fails.
    async fn unpause_container(&self, name: &str) -> Result<()>;

    /// Stops a container, killing it after `timeout_secs`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the container does not exist, or
    /// `ExternalService` if the engine fails.
    async fn stop_container(&self, name: &str, timeout_secs: i64) -> Result<()>;

    /// Removes a container. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns `ExternalService` if the engine fails.
    async fn remove_container(&self, name: &str, force: bool) -> Result<bool>;
}
