//! # moddock-store
//!
//! Persistence for everything the provisioning pipeline records.
//!
//! Handles:
//! - **Models**: Servers, playsets, shared mods, the playset/mod join, and
//!   resolved server mods.
//! - **Store**: A JSON document on disk, rewritten atomically on every
//!   mutation so that a failed operation leaves no partial state behind.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod models;
pub mod store;

pub use models::{ModRecord, Playset, PlaysetMod, ResolvedServerMod, Server};
pub use store::Store;
