//! Server image production for Moddock.
//!
//! Handles:
//! - **Runtime**: Java runtime required by a loader and game version.
//! - **Launcher**: Discovery of the server launcher download for a loader.
//! - **Properties**: `server.properties` and `ops.json` rendering.
//! - **Descriptor**: Deterministic compilation of the build descriptor.
//! - **Builder**: Driving the container engine to build the image.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod builder;
pub mod descriptor;
pub mod launcher;
pub mod properties;
pub mod runtime;

pub use builder::ImageBuilder;
pub use descriptor::{BuildDescriptor, compile};
pub use launcher::{HttpLauncherLocator, LauncherLocator};
