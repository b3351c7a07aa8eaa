//! # pmbridge Filesystem I/O Operations
//!
//! File: cli/src/common/fs/io.rs
//!
//! ## Overview
//!
//! Thin wrappers around `std::fs` that attach the offending path to every error.
//!
//! ## Architecture
//!
//! - **`ensure_dir_exists`**: `mkdir -p` semantics; a path that exists but is not a
//!   directory is a `PmError::FileSystem`. Used for the package manager's working and
//!   home directories and for the public asset directory.
//! - **`read_file_to_string`**: Reads manifests, templates and configuration files.
//! - **`write_string_to_file`**: Writes the merged manifest, creating the parent
//!   directory first and overwriting any previous file.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::fs::io;
//! use crate::core::error::Result;
//! use std::path::Path;
//!
//! # fn run_example() -> Result<()> {
//! let working_dir = Path::new("./work");
//! io::ensure_dir_exists(working_dir)?;
//! io::write_string_to_file(&working_dir.join("composer.json"), "{}\n")?;
//! let manifest = io::read_file_to_string(&working_dir.join("composer.json"))?;
//! # Ok(())
//! # }
//! ```
//!
use crate::core::error::{PmError, Result};
use anyhow::Context;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Ensures that a directory exists at `path`, creating it and any missing parents.
///
/// # Errors
///
/// Returns an `Err` if the path exists but is not a directory, or if creating it fails.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {:?}", path))?;
        info!("Created directory: {:?}", path);
    } else if !path.is_dir() {
        anyhow::bail!(PmError::FileSystem(format!(
            "Path exists but is not a directory: {:?}",
            path
        )));
    } else {
        debug!("Directory already exists: {:?}", path);
    }
    Ok(())
}

/// Reads the whole file at `path` into a string.
pub fn read_file_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file {:?}", path))
}

/// Writes `content` to `path`, replacing any existing file.
///
/// The parent directory is created when missing.
pub fn write_string_to_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir_exists(parent)?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write to file {:?}", path))?;
    info!("Wrote content to file: {:?}", path);
    Ok(())
}
