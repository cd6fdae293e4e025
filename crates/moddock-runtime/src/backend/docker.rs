//! Docker engine backend over `bollard`.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::{BuildImageOptions, RemoveImageOptions};
use bollard::models::{
    HostConfig, Mount, MountBindOptions, MountBindOptionsPropagationEnum, MountTypeEnum,
    PortBinding,
};
use bollard::{API_DEFAULT_VERSION, Docker};
use flate2::Compression;
use flate2::write::GzEncoder;
use futures::StreamExt;
use moddock_common::error::{ModdockError, Result};
use moddock_common::storage::{DESCRIPTOR_FILE, ENTRYPOINT_FILE};
use moddock_common::types::ContainerId;
use tracing::{debug, instrument};

use super::{BuildOutput, ContainerEngine, ContainerSnapshot, ContainerSpec};
use crate::state::ContainerStatus;

const SERVICE: &str = "engine";

/// [`ContainerEngine`] backed by a Docker-compatible daemon.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connects to the engine at `endpoint`, or to the local defaults
    /// (`DOCKER_HOST`, then the default socket) when `None`.
    ///
    /// `unix://` endpoints use a socket; `tcp://` and `http://` use HTTP.
    /// The connection itself is lazy: an unreachable engine is only
    /// reported by the first call.
    ///
    /// # Errors
    ///
    /// Returns `ExternalService` if the endpoint is malformed.
    pub fn connect(endpoint: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let docker = match endpoint {
            None => Docker::connect_with_local_defaults(),
            Some(ep) if ep.starts_with("unix://") => {
                Docker::connect_with_unix(ep, timeout_secs, API_DEFAULT_VERSION)
            }
            Some(ep) => Docker::connect_with_http(
                &ep.replacen("tcp://", "http://", 1),
                timeout_secs,
                API_DEFAULT_VERSION,
            ),
        }
        .map_err(|e| ModdockError::external(SERVICE, format!("cannot connect: {e}")))?;
        Ok(Self { docker })
    }
}

fn is_not_found(err: &BollardError) -> bool {
    matches!(
        err,
        BollardError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

fn engine_error(action: &str, target: &str, err: &BollardError) -> ModdockError {
    ModdockError::external(SERVICE, format!("{action} {target}: {err}"))
}

fn not_found_or(kind: &'static str, action: &str, target: &str, err: &BollardError) -> ModdockError {
    if is_not_found(err) {
        ModdockError::not_found(kind, target)
    } else {
        engine_error(action, target, err)
    }
}

/// Packs the regular files directly inside `dir` into a gzipped tarball.
///
/// Subdirectories are skipped. Entries are sorted by name and carry a zero
/// modification time, so equal inputs give equal archives.
///
/// # Errors
///
/// Returns `Io` if the directory or a file cannot be read.
pub fn pack_context(dir: &Path) -> Result<Vec<u8>> {
    let io = |e| ModdockError::io(dir, e);
    let mut entries = std::fs::read_dir(dir)
        .map_err(io)?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(io)?;
    entries.sort_by_key(std::fs::DirEntry::file_name);

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for entry in entries {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let data = std::fs::read(&path).map_err(|e| ModdockError::io(&path, e))?;
        let name = entry.file_name();
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(if name == ENTRYPOINT_FILE { 0o755 } else { 0o644 });
        header.set_mtime(0);
        header.set_cksum();
        builder
            .append_data(&mut header, &name, data.as_slice())
            .map_err(|e| ModdockError::io(&path, e))?;
    }
    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(io)
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    #[instrument(skip(self))]
    async fn build_image(&self, context: &Path, tag: &str) -> Result<BuildOutput> {
        let archive = pack_context(context)?;
        let options = BuildImageOptions {
            dockerfile: DESCRIPTOR_FILE.to_string(),
            t: tag.to_string(),
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let mut stream = std::pin::pin!(self.docker.build_image(options, None, Some(archive.into())));
        let mut output = BuildOutput::default();
        while let Some(item) = stream.next().await {
            match item {
                Ok(info) => {
                    if let Some(text) = info.stream {
                        for line in text.lines() {
                            debug!(tag, line, "build");
                            output.log.push(line.to_string());
                        }
                    }
                    if let Some(error) = info.error {
                        output.error = Some(error);
                    }
                }
                Err(BollardError::DockerStreamError { error }) => {
                    output.error = Some(error);
                    break;
                }
                Err(e) => return Err(engine_error("build", tag, &e)),
            }
        }
        Ok(output)
    }

    #[instrument(skip(self))]
    async fn remove_image(&self, tag: &str) -> Result<bool> {
        let options = RemoveImageOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_image(tag, Some(options), None).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(engine_error("remove image", tag, &e)),
        }
    }

    #[instrument(skip(self))]
    async fn image_id(&self, tag: &str) -> Result<Option<String>> {
        match self.docker.inspect_image(tag).await {
            Ok(image) => image
                .id
                .map(Some)
                .ok_or_else(|| ModdockError::external(SERVICE, format!("image {tag} has no id"))),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(engine_error("inspect image", tag, &e)),
        }
    }

    #[instrument(skip(self))]
    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerSnapshot>> {
        let response = match self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(response) => response,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(engine_error("inspect container", name, &e)),
        };
        let id = response
            .id
            .ok_or_else(|| ModdockError::external(SERVICE, format!("container {name} has no id")))?;
        let status = response
            .state
            .and_then(|s| s.status)
            .and_then(|s| ContainerStatus::parse(&s.to_string()))
            .ok_or_else(|| {
                ModdockError::external(SERVICE, format!("container {name} reported no status"))
            })?;
        Ok(Some(ContainerSnapshot {
            id: ContainerId::new(id),
            status,
        }))
    }

    #[instrument(skip(self, spec), fields(name = %spec.name, image = %spec.image))]
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        let port_bindings = HashMap::from([(
            spec.container_port.clone(),
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(spec.host_port.to_string()),
            }]),
        )]);
        let mounts = spec
            .mounts
            .iter()
            .map(|m| Mount {
                target: Some(m.target.clone()),
                source: Some(m.source.to_string_lossy().into_owned()),
                typ: Some(MountTypeEnum::BIND),
                bind_options: Some(MountBindOptions {
                    propagation: Some(MountBindOptionsPropagationEnum::RSHARED),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .collect();
        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            exposed_ports: Some(HashMap::from([(spec.container_port.clone(), HashMap::new())])),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                mounts: Some(mounts),
                ..Default::default()
            }),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| engine_error("create container", &spec.name, &e))?;
        for warning in &created.warnings {
            tracing::warn!(name = %spec.name, %warning, "engine warning");
        }
        self.docker
            .start_container(&spec.name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| engine_error("start container", &spec.name, &e))?;
        Ok(ContainerId::new(created.id))
    }

    #[instrument(skip(self))]
    async fn start_container(&self, name: &str) -> Result<()> {
        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| not_found_or("container", "start container", name, &e))
    }

    #[instrument(skip(self))]
    async fn unpause_container(&self, name: &str) -> Result<()> {
        self.docker
            .unpause_container(name)
            .await
            .map_err(|e| not_found_or("container", "unpause container", name, &e))
    }

    #[instrument(skip(self))]
    async fn stop_container(&self, name: &str, timeout_secs: i64) -> Result<()> {
        self.docker
            .stop_container(name, Some(StopContainerOptions { t: timeout_secs }))
            .await
            .map_err(|e| not_found_or("container", "stop container", name, &e))
    }

    #[instrument(skip(self))]
    async fn remove_container(&self, name: &str, force: bool) -> Result<bool> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        match self.docker.remove_container(name, Some(options)).await {
            Ok(()) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(engine_error("remove container", name, &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;
    use moddock_common::error::ErrorKind;

    use super::*;

    fn unpack(archive: &[u8]) -> Vec<(String, u32, String)> {
        let mut tar = tar::Archive::new(GzDecoder::new(archive));
        tar.entries()
            .expect("entries")
            .map(|entry| {
                let mut entry = entry.expect("entry");
                let name = entry.path().expect("path").display().to_string();
                let mode = entry.header().mode().expect("mode");
                let mut body = String::new();
                let _ = entry.read_to_string(&mut body).expect("read");
                (name, mode, body)
            })
            .collect()
    }

    #[test]
    fn context_holds_top_level_files_only() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        std::fs::write(dir.path().join(DESCRIPTOR_FILE), "FROM scratch\n").expect("write");
        std::fs::write(dir.path().join(ENTRYPOINT_FILE), "#!/bin/sh\n").expect("write");
        std::fs::create_dir_all(dir.path().join("world/region")).expect("mkdir");
        std::fs::write(dir.path().join("world/region/r.0.0.mca"), "x").expect("write");

        let entries = unpack(&pack_context(dir.path()).expect("pack"));
        assert_eq!(
            entries,
            vec![
                (DESCRIPTOR_FILE.to_string(), 0o644, "FROM scratch\n".to_string()),
                (ENTRYPOINT_FILE.to_string(), 0o755, "#!/bin/sh\n".to_string()),
            ]
        );
    }

    #[test]
    fn packing_is_deterministic() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        std::fs::write(dir.path().join(DESCRIPTOR_FILE), "FROM scratch\n").expect("write");
        let first = pack_context(dir.path()).expect("pack");
        let second = pack_context(dir.path()).expect("pack");
        assert_eq!(first, second);
    }

    #[test]
    fn missing_context_is_an_io_error() {
        let err = pack_context(Path::new("/nonexistent/moddock/context")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn unreachable_engine_is_an_external_service_error() {
        let engine = DockerEngine::connect(Some("tcp://127.0.0.1:9"), 2).expect("connect");
        let err = engine.image_id("fabric-none").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalService);
    }
}
