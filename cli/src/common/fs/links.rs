//! # pmbridge Filesystem Link Operations
//!
//! File: cli/src/common/fs/links.rs
//!
//! ## Overview
//!
//! Symbolic link helpers for the asset installer, which publishes directories from
//! the vendor tree by linking them into a public directory.
//!
//! ## Architecture
//!
//! - **`create_symlink`**: Validates the source, creates the link's parent directory and
//!   handles whatever already sits at the target:
//!     - a link that already resolves to the source is left alone (idempotent),
//!     - a link pointing anywhere else is replaced,
//!     - a real file or directory is moved aside to `<name>.pmbridge_backup`.
//! - **`remove_symlinks_in`**: Deletes the symbolic links directly inside a directory,
//!   leaving regular files and directories untouched. Links are removed, never
//!   followed, so the vendor tree is never modified.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::fs::links;
//! use crate::core::error::Result;
//! use std::path::Path;
//!
//! # fn run_example() -> Result<()> {
//! let removed = links::remove_symlinks_in(Path::new("./public/assets"))?;
//! links::create_symlink(
//!     Path::new("./vendor/acme/widgets/Resources/Public"),
//!     Path::new("./public/assets/acme_widgets"),
//! )?;
//! # Ok(())
//! # }
//! ```
//!
use crate::common::fs::io::ensure_dir_exists;
use crate::core::error::Result;
use anyhow::{bail, Context};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Suffix appended to a non-link item that occupies a link target.
const BACKUP_SUFFIX: &str = "pmbridge_backup";

/// Creates a symbolic link at `target` pointing to `source`.
///
/// # Errors
///
/// Returns an `Err` if `source` does not exist, the target's parent cannot be created,
/// an existing item cannot be replaced or backed up, or the link itself cannot be created.
pub fn create_symlink(source: &Path, target: &Path) -> Result<()> {
    debug!("Creating symlink from {:?} to {:?}", source, target);

    if !source.exists() {
        bail!("Symlink source path does not exist: {:?}", source);
    }

    if let Some(parent) = target.parent() {
        ensure_dir_exists(parent).with_context(|| {
            format!("Failed to create parent directory for target {:?}", target)
        })?;
    }

    // `symlink_metadata` does not follow links, so dangling links are seen too.
    if let Ok(metadata) = target.symlink_metadata() {
        if metadata.file_type().is_symlink() {
            if points_to(target, source) {
                debug!("Symlink already exists and is correct: {:?}", target);
                return Ok(());
            }
            debug!("Replacing outdated symlink {:?}", target);
            fs::remove_file(target)
                .with_context(|| format!("Failed to remove outdated symlink {:?}", target))?;
        } else {
            let backup_path = backup_path_for(target);
            warn!(
                "Target {:?} exists and is not a link, backing up to {:?}",
                target, backup_path
            );
            fs::rename(target, &backup_path)
                .with_context(|| format!("Failed to backup existing item at {:?}", target))?;
        }
    }

    std::os::unix::fs::symlink(source, target).with_context(|| {
        format!("Failed to create symlink from {:?} to {:?}", source, target)
    })?;
    info!("Created symlink: {:?} -> {:?}", target, source);
    Ok(())
}

/// Removes every symbolic link directly inside `dir` and returns their paths.
///
/// A missing directory has no links and is not an error.
pub fn remove_symlinks_in(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut removed = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to list directory {:?}", dir))?;
        if !entry.path_is_symlink() {
            continue;
        }
        fs::remove_file(entry.path())
            .with_context(|| format!("Failed to remove symlink {:?}", entry.path()))?;
        debug!("Removed symlink {:?}", entry.path());
        removed.push(entry.into_path());
    }
    removed.sort();
    Ok(removed)
}

/// True when the link at `link` resolves to the same canonical path as `source`.
fn points_to(link: &Path, source: &Path) -> bool {
    let Ok(existing) = fs::read_link(link) else {
        return false;
    };
    let link_parent = link.parent().unwrap_or_else(|| Path::new("."));
    let resolved = link_parent.join(existing);
    match (resolved.canonicalize(), source.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn backup_path_for(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(BACKUP_SUFFIX);
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    #[test]
    fn test_create_symlink_basic() -> Result<()> {
        let dir = tempdir()?;
        let source = dir.path().join("vendor/acme/widgets/build");
        fs::create_dir_all(&source)?;
        let target = dir.path().join("public/acme_widgets");
        create_symlink(&source, &target)?;
        assert!(target.is_symlink());
        assert_eq!(fs::read_link(&target)?, source);
        Ok(())
    }

    #[test]
    fn test_create_symlink_already_correct_is_noop() -> Result<()> {
        let dir = tempdir()?;
        let source = dir.path().join("source");
        fs::create_dir(&source)?;
        let target = dir.path().join("target");
        symlink(&source, &target)?;
        create_symlink(&source, &target)?;
        assert!(!backup_path_for(&target).exists());
        assert_eq!(fs::read_link(&target)?, source);
        Ok(())
    }

    #[test]
    fn test_create_symlink_replaces_outdated_link() -> Result<()> {
        let dir = tempdir()?;
        let old = dir.path().join("old");
        let new = dir.path().join("new");
        fs::create_dir(&old)?;
        fs::create_dir(&new)?;
        let target = dir.path().join("target");
        symlink(&old, &target)?;
        create_symlink(&new, &target)?;
        assert_eq!(fs::read_link(&target)?, new);
        assert!(!backup_path_for(&target).exists());
        Ok(())
    }

    #[test]
    fn test_create_symlink_backs_up_real_directory() -> Result<()> {
        let dir = tempdir()?;
        let source = dir.path().join("source");
        fs::create_dir(&source)?;
        let target = dir.path().join("acme_widgets");
        fs::create_dir(&target)?;
        fs::write(target.join("keep.txt"), "keep")?;

        create_symlink(&source, &target)?;
        let backup = dir.path().join("acme_widgets.pmbridge_backup");
        assert!(target.is_symlink());
        assert_eq!(fs::read_to_string(backup.join("keep.txt"))?, "keep");
        Ok(())
    }

    #[test]
    fn test_create_symlink_source_missing() {
        let dir = tempdir().unwrap();
        let result = create_symlink(&dir.path().join("missing"), &dir.path().join("target"));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("source path does not exist"));
    }

    #[test]
    fn test_remove_symlinks_in_keeps_regular_entries() -> Result<()> {
        let dir = tempdir()?;
        let source = dir.path().join("source");
        fs::create_dir(&source)?;
        fs::write(source.join("app.js"), "js")?;
        let public = dir.path().join("public");
        fs::create_dir(&public)?;
        symlink(&source, public.join("linked"))?;
        symlink(dir.path().join("gone"), public.join("dangling"))?;
        fs::write(public.join("index.html"), "html")?;

        let removed = remove_symlinks_in(&public)?;
        assert_eq!(removed, vec![public.join("dangling"), public.join("linked")]);
        assert!(public.join("index.html").exists());
        assert!(source.join("app.js").exists(), "link targets must survive");
        Ok(())
    }

    #[test]
    fn test_remove_symlinks_in_missing_dir() -> Result<()> {
        let dir = tempdir()?;
        assert!(remove_symlinks_in(&dir.path().join("missing"))?.is_empty());
        Ok(())
    }
}
