//! # pmbridge Command Modules
//!
//! File: cli/src/commands/mod.rs
//!
//! ## Overview
//!
//! This module aggregates the top-level commands of the pmbridge CLI and the
//! `AppContext` every handler receives from `main.rs`.
//!
//! ## Architecture
//!
//! Each command lives in its own file with a Clap `Args` struct and a synchronous
//! `handle_*` function returning `Result<()>`:
//!
//! - `install`: Write the merged manifest and run `install`
//! - `update`: Write the merged manifest and run `update`
//! - `exec`: Run any package-manager operation
//! - `manifest`: Write the merged manifest only (`write-manifest`)
//! - `assets`: Link public assets of installed dependencies (`install-assets`)
//! - `list`: Show the collected packages and their requirements
//!
//! `support` holds the steps several commands share.
//!
use crate::core::config::Config;

pub mod assets;
pub mod exec;
pub mod install;
pub mod list;
pub mod manifest;
mod support;
pub mod update;

/// Everything a command handler needs besides its own arguments.
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    /// Fully layered and validated configuration.
    pub config: Config,
    /// Number of `-v` flags, forwarded to the package manager.
    pub verbosity: u8,
}
