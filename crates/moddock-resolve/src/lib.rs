//! # moddock-resolve
//!
//! Computes the full set of mods a server needs.
//!
//! Handles:
//! - **Graph**: Arena of discovered projects and the dependency edges between them.
//! - **Resolver**: Greedy worklist resolution of requested mods and their
//!   required and optional dependencies.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod graph;
pub mod resolver;

pub use graph::DependencyGraph;
pub use resolver::{Resolution, Resolver};
