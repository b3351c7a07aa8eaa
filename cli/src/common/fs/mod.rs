//! # pmbridge Filesystem Utilities (`common::fs`)
//!
//! File: cli/src/common/fs/mod.rs
//!
//! ## Overview
//!
//! Small filesystem helpers shared by the manifest writer, the asset installer and
//! the package-manager runner.
//!
//! ## Architecture
//!
//! - **`io`**: Ensuring directories exist (`ensure_dir_exists`), reading files to
//!   strings (`read_file_to_string`) and writing strings to files
//!   (`write_string_to_file`).
//! - **`links`**: Creating symbolic links idempotently (`create_symlink`) and sweeping
//!   stale links out of a directory (`remove_symlinks_in`). Used by `common::assets`.
//!
//! Functions are imported from their submodule, e.g.
//! `use crate::common::fs::io::ensure_dir_exists;`.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::fs::{io, links};
//! use crate::core::error::Result;
//! use std::path::Path;
//!
//! # fn run_example() -> Result<()> {
//! let public_dir = Path::new("./public/assets");
//! io::ensure_dir_exists(public_dir)?;
//! links::remove_symlinks_in(public_dir)?;
//! links::create_symlink(
//!     Path::new("./vendor/acme/widgets/build"),
//!     &public_dir.join("acme_widgets"),
//! )?;
//! # Ok(())
//! # }
//! ```
//!

/// Basic file I/O (`ensure_dir_exists`, `read_file_to_string`, `write_string_to_file`).
pub mod io;
/// Symbolic link management (`create_symlink`, `remove_symlinks_in`).
pub mod links;
