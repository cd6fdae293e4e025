//! # moddock-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the entire Moddock workspace.
//!
//! This crate is the leaf of the dependency graph; it depends on no other
//! internal crate and provides the foundational primitives that the
//! resolver, image, runtime, and orchestration crates build upon.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod filelock;
pub mod settings;
pub mod storage;
pub mod types;
