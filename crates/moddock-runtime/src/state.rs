//! Container status as reported by the engine.

use std::fmt;

/// Observed status of an existing container.
///
/// A container that does not exist has no status; callers model that as
/// `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerStatus {
    /// Created but never started.
    Created,
    /// Running.
    Running,
    /// Frozen by the engine.
    Paused,
    /// Being restarted by the engine.
    Restarting,
    /// Stopped after running.
    Exited,
    /// Failed to stop or be removed cleanly; unusable.
    Dead,
    /// Being removed.
    Removing,
}

impl ContainerStatus {
    /// Lowercase engine name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::Removing => "removing",
        }
    }

    /// Parses the engine's lowercase status name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "restarting" => Some(Self::Restarting),
            "exited" => Some(Self::Exited),
            "dead" => Some(Self::Dead),
            "removing" => Some(Self::Removing),
            _ => None,
        }
    }

    /// Whether the container cannot be started or stopped any more and has
    /// to be rebuilt.
    #[must_use]
    pub const fn is_unusable(self) -> bool {
        matches!(self, Self::Dead | Self::Removing)
    }

    /// Whether the game process is (or is about to be) alive.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused | Self::Restarting)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_every_engine_status() {
        for status in [
            ContainerStatus::Created,
            ContainerStatus::Running,
            ContainerStatus::Paused,
            ContainerStatus::Restarting,
            ContainerStatus::Exited,
            ContainerStatus::Dead,
            ContainerStatus::Removing,
        ] {
            assert_eq!(ContainerStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ContainerStatus::parse(""), None);
    }

    #[test]
    fn only_dead_and_removing_are_unusable() {
        assert!(ContainerStatus::Dead.is_unusable());
        assert!(ContainerStatus::Removing.is_unusable());
        assert!(!ContainerStatus::Exited.is_unusable());
    }

    #[test]
    fn paused_and_restarting_count_as_active() {
        assert!(ContainerStatus::Paused.is_active());
        assert!(ContainerStatus::Restarting.is_active());
        assert!(!ContainerStatus::Created.is_active());
        assert!(!ContainerStatus::Exited.is_active());
    }
}
