//! # moddock-registry
//!
//! Read-only access to the external mod registry.
//!
//! Handles:
//! - **Models**: Projects, versions, declared dependencies, and collections.
//! - **Client**: The [`ModRegistry`](client::ModRegistry) capability and its HTTP implementation.
//! - **Limiter**: Token-bucket throttling of registry requests.
//! - **Selector**: Picking one compatible version of a mod for a loader and game version.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod client;
pub mod limiter;
pub mod models;
pub mod selector;

pub use client::{HttpRegistry, ModRegistry};
pub use models::{Collection, Dependency, DependencyType, Project, Version, VersionFile, VersionInfo};
pub use selector::VersionSelector;
