//! Image builds through the container engine.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use moddock_common::constants::BUILD_LOG_TAIL_LINES;
use moddock_common::error::{ModdockError, Result};
use moddock_common::settings::ServerBuildSettings;
use moddock_runtime::backend::{BuildOutput, ContainerEngine};

/// Log line prefixes the classic builder prints once an image is complete.
const SUCCESS_MARKERS: [&str; 2] = ["Successfully built", "Successfully tagged"];

/// Builds server images from compiled build descriptors.
pub struct ImageBuilder {
    engine: Arc<dyn ContainerEngine>,
}

impl fmt::Debug for ImageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBuilder").finish_non_exhaustive()
    }
}

impl ImageBuilder {
    /// Creates a builder driving `engine`.
    #[must_use]
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// Builds the image for a server from the descriptor in `context_dir`
    /// and returns its name, `<loader>-<server_id>`.
    ///
    /// A failed build leaves no new image behind. The image the tag pointed
    /// at before the build is kept, so a failed rebuild does not cost the
    /// last working image. Cleanup failures are only logged.
    ///
    /// # Errors
    ///
    /// Returns `BuildFailure` with the tail of the build log if the engine
    /// reports an error or the log does not end in a success marker, or
    /// `ExternalService` if the engine cannot be reached.
    pub async fn build(&self, settings: &ServerBuildSettings, context_dir: &Path) -> Result<String> {
        let image = settings.image_name();
        let previous = self.engine.image_id(&image).await?;
        tracing::info!(server_id = %settings.server_id, %image, ?previous, "building image");

        let output = self.engine.build_image(context_dir, &image).await?;
        if succeeded(&output) {
            tracing::info!(%image, lines = output.log.len(), "image built");
            return Ok(image);
        }

        tracing::warn!(%image, error = ?output.error, "image build failed");
        self.discard_failed(&image, previous.as_deref()).await;
        Err(ModdockError::BuildFailure {
            image,
            log_tail: log_tail(&output),
        })
    }

    /// Removes the image a failed build left under `image`, unless the tag
    /// still points at `previous`.
    async fn discard_failed(&self, image: &str, previous: Option<&str>) {
        let current = match self.engine.image_id(image).await {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(%image, error = %e, "cannot inspect image after failed build");
                return;
            }
        };
        if current.is_none() || current.as_deref() == previous {
            tracing::debug!(%image, ?previous, "failed build left the tag unchanged");
            return;
        }
        match self.engine.remove_image(image).await {
            Ok(removed) => tracing::debug!(%image, removed, "cleaned up failed image"),
            Err(e) => tracing::warn!(%image, error = %e, "failed to remove image after failed build"),
        }
    }
}

/// A build succeeded when the engine reported no error and its last
/// non-empty log line is a success marker.
fn succeeded(output: &BuildOutput) -> bool {
    if output.error.is_some() {
        return false;
    }
    output
        .log
        .iter()
        .rev()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .is_some_and(|last| SUCCESS_MARKERS.iter().any(|m| last.starts_with(m)))
}

/// Last log lines, followed by the engine error if there is one.
fn log_tail(output: &BuildOutput) -> String {
    let start = output.log.len().saturating_sub(BUILD_LOG_TAIL_LINES);
    let mut lines: Vec<&str> = output.log[start..].iter().map(String::as_str).collect();
    if let Some(error) = &output.error {
        lines.push(error);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use moddock_common::error::ErrorKind;
    use moddock_common::settings::ServerSettings;
    use moddock_common::types::{ContainerId, Loader, ServerId};
    use moddock_runtime::backend::{ContainerSnapshot, ContainerSpec};

    use super::*;

    /// Engine replaying a canned build and recording image removals.
    ///
    /// The tag points at `before` until the build runs and at `after` once
    /// it has.
    struct ScriptedBuild {
        output: BuildOutput,
        before: Option<String>,
        after: Option<String>,
        fail_removal: bool,
        built: Mutex<Vec<String>>,
        removed: Mutex<Vec<String>>,
    }

    impl ScriptedBuild {
        fn new(log: &[&str], error: Option<&str>) -> Self {
            Self {
                output: BuildOutput {
                    log: log.iter().map(ToString::to_string).collect(),
                    error: error.map(ToString::to_string),
                },
                before: None,
                after: Some("sha256:new".into()),
                fail_removal: false,
                built: Mutex::new(Vec::new()),
                removed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ContainerEngine for ScriptedBuild {
        async fn build_image(&self, _context: &Path, tag: &str) -> Result<BuildOutput> {
            self.built.lock().unwrap().push(tag.to_string());
            Ok(self.output.clone())
        }
        async fn remove_image(&self, tag: &str) -> Result<bool> {
            self.removed.lock().unwrap().push(tag.to_string());
            if self.fail_removal {
                return Err(ModdockError::external("engine", "conflict"));
            }
            Ok(true)
        }
        async fn image_id(&self, _tag: &str) -> Result<Option<String>> {
            if self.built.lock().unwrap().is_empty() {
                Ok(self.before.clone())
            } else {
                Ok(self.after.clone())
            }
        }
        async fn inspect_container(&self, _name: &str) -> Result<Option<ContainerSnapshot>> {
            Ok(None)
        }
        async fn create_container(&self, _spec: &ContainerSpec) -> Result<ContainerId> {
            Ok(ContainerId::new("unused"))
        }
        async fn start_container(&self, _name: &str) -> Result<()> {
            Ok(())
        }
        async fn unpause_container(&self, _name: &str) -> Result<()> {
            Ok(())
        }
        async fn stop_container(&self, _name: &str, _timeout_secs: i64) -> Result<()> {
            Ok(())
        }
        async fn remove_container(&self, _name: &str, _force: bool) -> Result<bool> {
            Ok(false)
        }
    }

    fn settings() -> ServerBuildSettings {
        ServerBuildSettings::new(
            ServerId::new("s1"),
            "survival",
            &ServerSettings::new(Loader::Paper, "1.20.1"),
            "https://api.papermc.io/paper.jar",
        )
    }

    async fn build(engine: &Arc<ScriptedBuild>) -> Result<String> {
        let as_engine: Arc<dyn ContainerEngine> = engine.clone();
        ImageBuilder::new(as_engine)
            .build(&settings(), Path::new("/unused"))
            .await
    }

    #[tokio::test]
    async fn success_marker_returns_image_name() {
        let engine = Arc::new(ScriptedBuild::new(
            &["Step 1/9 : FROM eclipse-temurin:17-jre", "Successfully built 0f3a", "Successfully tagged paper-s1:latest", ""],
            None,
        ));
        assert_eq!(build(&engine).await.expect("build"), "paper-s1");
        assert_eq!(*engine.built.lock().unwrap(), vec!["paper-s1"]);
        assert!(engine.removed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn engine_error_fails_and_removes_image() {
        let engine = Arc::new(ScriptedBuild::new(
            &["Step 4/9 : ADD https://x/a.jar /downloads/"],
            Some("ADD failed: 404 Not Found"),
        ));
        let err = build(&engine).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BuildFailure);
        let msg = err.to_string();
        assert!(msg.contains("paper-s1") && msg.contains("ADD failed"), "{msg}");
        assert_eq!(*engine.removed.lock().unwrap(), vec!["paper-s1"]);
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_image() {
        let mut scripted = ScriptedBuild::new(&["Step 4/9 : ADD"], Some("ADD failed"));
        scripted.before = Some("sha256:good".into());
        scripted.after = Some("sha256:good".into());
        let engine = Arc::new(scripted);
        let err = build(&engine).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BuildFailure);
        assert!(engine.removed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_rebuild_that_moved_the_tag_is_removed() {
        let mut scripted = ScriptedBuild::new(&["Successfully built 9e1d", "oops"], None);
        scripted.before = Some("sha256:good".into());
        scripted.after = Some("sha256:broken".into());
        let engine = Arc::new(scripted);
        assert!(build(&engine).await.is_err());
        assert_eq!(*engine.removed.lock().unwrap(), vec!["paper-s1"]);
    }

    #[tokio::test]
    async fn failed_first_build_without_image_removes_nothing() {
        let mut scripted = ScriptedBuild::new(&[], Some("pull access denied"));
        scripted.after = None;
        let engine = Arc::new(scripted);
        assert!(build(&engine).await.is_err());
        assert!(engine.removed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn log_without_marker_is_a_failure() {
        let engine = Arc::new(ScriptedBuild::new(&["Step 9/9 : ENTRYPOINT"], None));
        let err = build(&engine).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BuildFailure);
    }

    #[tokio::test]
    async fn earlier_marker_does_not_count() {
        let engine = Arc::new(ScriptedBuild::new(
            &["Successfully built 0f3a", "something went wrong afterwards"],
            None,
        ));
        assert!(build(&engine).await.is_err());
    }

    #[tokio::test]
    async fn removal_failure_keeps_build_failure() {
        let mut scripted = ScriptedBuild::new(&[], Some("boom"));
        scripted.fail_removal = true;
        let engine = Arc::new(scripted);
        let err = build(&engine).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BuildFailure);
        assert_eq!(engine.removed.lock().unwrap().len(), 1);
    }

    #[test]
    fn log_tail_keeps_last_lines_and_error() {
        let log: Vec<String> = (0..30).map(|i| format!("line {i}")).collect();
        let output = BuildOutput {
            log,
            error: Some("fatal".into()),
        };
        let tail = log_tail(&output);
        let lines: Vec<&str> = tail.lines().collect();
        assert_eq!(lines.len(), BUILD_LOG_TAIL_LINES + 1);
        assert_eq!(lines[0], "line 10");
        assert_eq!(lines.last(), Some(&"fatal"));
    }
}
