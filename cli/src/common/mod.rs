//! # pmbridge Common Utilities (`common`)
//!
//! File: cli/src/common/mod.rs
//!
//! ## Overview
//!
//! This module is the organizational entry point for the building blocks the
//! commands are assembled from. It keeps command-specific logic (`commands::`)
//! separate from reusable machinery and from core infrastructure (`core::`).
//!
//! ## Architecture
//!
//! - **`process`**: The managed external process: spawning with an explicit
//!   environment, incremental output delivery, timeout enforcement and guaranteed
//!   cleanup.
//! - **`package_manager`**: Builds package-manager invocations (argv, environment
//!   allowlist, private home directory) on top of `process`.
//! - **`manifest`**: Collects package manifests and writes the merged manifest.
//! - **`assets`**: Links public assets of installed dependencies into a public directory.
//! - **`fs`**: Filesystem helpers (`io`, `links`).
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::package_manager::PackageManagerProcess;
//! use crate::core::error::Result;
//!
//! # fn run_example(cfg: &crate::core::config::Config) -> Result<()> {
//! let outcome = PackageManagerProcess::new(&cfg.package_manager, std::env::vars())
//!     .run("install", &[], None)?;
//! println!("{}", outcome.output);
//! # Ok(())
//! # }
//! ```
//!

/// Links public assets of installed dependencies.
pub mod assets;
/// Filesystem helpers (I/O, symbolic links).
pub mod fs;
/// Manifest collection, merging and writing.
pub mod manifest;
/// Package-manager invocations built on `process`.
pub mod package_manager;
/// Supervised external processes.
pub mod process;
