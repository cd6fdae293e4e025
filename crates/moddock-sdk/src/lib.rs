//! # moddock-sdk
//!
//! Public SDK for using Moddock as a Rust library.
//!
//! Provides two main entry points:
//! - [`ProvisionerBuilder`](builder::ProvisionerBuilder): Fluent API for wiring
//!   the registry, container engine, and launcher services.
//! - [`Provisioner`](provisioner::Provisioner): Playset management and the
//!   per-server pipeline (resolve, build, start, stop, delete).
//!
//! # Example
//!
//! ```rust,no_run
//! use moddock_common::config::ModdockConfig;
//! use moddock_common::settings::ServerSettings;
//! use moddock_common::types::Loader;
//! use moddock_sdk::builder::ProvisionerBuilder;
//!
//! # async fn run() -> moddock_common::error::Result<()> {
//! let provisioner = ProvisionerBuilder::new(ModdockConfig::default()).build()?;
//! let server = provisioner.create_server("survival", ServerSettings::new(Loader::Fabric, "1.20.1"))?;
//! let _ = provisioner.build(&server.id).await?;
//! let _ = provisioner.start(&server.id).await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod builder;
pub mod locks;
pub mod provisioner;

pub use builder::ProvisionerBuilder;
pub use provisioner::{BuildReport, Provisioner, ServerDetails};
