//! Unified error types for the Moddock workspace.
//!
//! Every pipeline stage reports failures through [`ModdockError`]. The
//! variants are typed so that an outer API layer can map them to responses
//! through [`ModdockError::kind`] without inspecting message text.

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of an error, stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A project, version, server, playset, image, or container was absent.
    NotFound,
    /// The registry or container engine was unreachable or misbehaved.
    ExternalService,
    /// The engine ran a build that did not report success.
    BuildFailure,
    /// A container is in a state that forbids the requested operation.
    ContainerState,
    /// Local I/O, configuration, or serialization problem.
    Internal,
}

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum ModdockError {
    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// No version of a project matches the server's loader and game version.
    #[error(
        "no version of project {project} is compatible with {loader} {game_version}{}",
        required_by_suffix(.required_by)
    )]
    NoCompatibleVersion {
        /// Registry project id.
        project: String,
        /// Loader the server runs.
        loader: String,
        /// Game version the server targets.
        game_version: String,
        /// Projects that declared the dependency; empty for requested mods.
        required_by: Vec<String>,
    },

    /// An external service was unreachable, timed out, or answered unexpectedly.
    #[error("{service} error: {message}")]
    ExternalService {
        /// Name of the failing service (`registry`, `engine`, `launcher`).
        service: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// The container engine ran the build but did not report success.
    #[error("build of image {image} failed; last log lines:\n{log_tail}")]
    BuildFailure {
        /// Image tag that was being built.
        image: String,
        /// Tail of the captured build log.
        log_tail: String,
    },

    /// A container is in a state that forbids the requested operation.
    #[error("container {container} is {state}: {message}")]
    ContainerState {
        /// Container name.
        container: String,
        /// Observed container state.
        state: String,
        /// Guidance for the operator.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl ModdockError {
    /// Returns the stable classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::NoCompatibleVersion { .. } => ErrorKind::NotFound,
            Self::ExternalService { .. } => ErrorKind::ExternalService,
            Self::BuildFailure { .. } => ErrorKind::BuildFailure,
            Self::ContainerState { .. } => ErrorKind::ContainerState,
            Self::Io { .. } | Self::Config { .. } | Self::Serialization { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Shorthand for a [`ModdockError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Shorthand for an [`ModdockError::ExternalService`] failure.
    pub fn external(service: &'static str, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service,
            message: message.into(),
        }
    }

    /// Wraps an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn required_by_suffix(required_by: &[String]) -> String {
    if required_by.is_empty() {
        String::new()
    } else {
        format!(" (required by {})", required_by.join(", "))
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ModdockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_compatible_version_is_classified_as_not_found() {
        let err = ModdockError::NoCompatibleVersion {
            project: "AANobbMI".into(),
            loader: "fabric".into(),
            game_version: "1.20.1".into(),
            required_by: Vec::new(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let msg = err.to_string();
        assert!(msg.contains("AANobbMI"), "got: {msg}");
        assert!(msg.contains("1.20.1"), "got: {msg}");
        assert!(!msg.contains("required by"), "got: {msg}");
    }

    #[test]
    fn no_compatible_version_names_declaring_projects() {
        let err = ModdockError::NoCompatibleVersion {
            project: "lib".into(),
            loader: "paper".into(),
            game_version: "1.20.1".into(),
            required_by: vec!["a".into(), "b".into()],
        };
        assert!(err.to_string().ends_with("paper 1.20.1 (required by a, b)"));
    }

    #[test]
    fn build_failure_message_carries_log_tail() {
        let err = ModdockError::BuildFailure {
            image: "fabric-1".into(),
            log_tail: "Step 3/9 : ADD bad\nerror".into(),
        };
        assert_eq!(err.kind(), ErrorKind::BuildFailure);
        assert!(err.to_string().contains("Step 3/9"));
    }

    #[test]
    fn local_failures_are_internal() {
        let err = ModdockError::Config {
            message: "bad".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Internal);
        let err = ModdockError::io("/tmp/x", std::io::Error::other("boom"));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
