//! Staged release pipeline library.
//!
//! This crate provides the stages behind the `relpipe` CLI: a persistent
//! build counter, descriptor regeneration, dependency-ordered compilation
//! through a vendor toolchain, signing and packaging, and publishing to a
//! release repository. Each stage is usable on its own; [`pipeline`] composes
//! them.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`compiler`] - Vendor compiler orchestration in dependency order
//! - [`config`] - `relpipe.toml` loading and validation
//! - [`credential`] - Signing password loading
//! - [`descriptor`] - Module descriptor parsing and rendering
//! - [`error`] - Error taxonomy
//! - [`graph`] - Module dependency graph and build order
//! - [`manifest_gen`] - Descriptor file-list and version regeneration
//! - [`module`] - Module and platform-variant model
//! - [`output`] - Progress and summary formatting
//! - [`packager`] - Signing, descriptor merging, and archiving
//! - [`pipeline`] - Stage orchestration and read-only commands
//! - [`process`] - External command execution seam
//! - [`publisher`] - Release repository publishing
//! - [`version_store`] - Persistent build counter

pub mod cli;
pub mod compiler;
pub mod config;
pub mod credential;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod manifest_gen;
pub mod module;
pub mod output;
pub mod packager;
pub mod pipeline;
pub mod process;
pub mod publisher;
pub mod version_store;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
