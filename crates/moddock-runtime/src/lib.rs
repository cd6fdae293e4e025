//! Container engine access and lifecycle management for Moddock servers.
//!
//! Handles:
//! - **Backend**: The [`ContainerEngine`](backend::ContainerEngine) capability
//!   and its Docker implementation over `bollard`.
//! - **State**: Container status as reported by the engine.
//! - **Lifecycle**: Start and stop policies mapping a server to at most one
//!   container named `<loader>-<server_id>`.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod lifecycle;
pub mod state;

pub use backend::{BuildOutput, ContainerEngine, ContainerSnapshot, ContainerSpec, MountSpec};
pub use lifecycle::{LifecycleManager, StartOutcome, StopOutcome};
pub use state::ContainerStatus;
