//! # Public Asset Installation (`common::assets`)
//!
//! File: cli/src/common/assets.rs
//!
//! ## Overview
//!
//! After the package manager has populated the vendor directory, the public assets of
//! each required dependency are published by symlinking them into one public
//! directory:
//!
//! ```text
//! <public_dir>/<vendor>_<package>  ->  <vendor_dir>/<vendor>/<package>/<asset path>
//! ```
//!
//! The candidate asset paths (`assets.asset_paths`, by default `Resources/Public/` and
//! `build`) are tried in order and the first one that exists is linked.
//!
//! ## Architecture
//!
//! 1. Every symlink directly inside the public directory is removed, so packages that
//!    are no longer required lose their link. Regular files are left alone.
//! 2. The public directory is created when missing.
//! 3. Each dependency gets its link via `fs::links::create_symlink`. A link that
//!    cannot be created is logged and the remaining dependencies are still processed;
//!    the failures are reported together as `PmError::Asset` at the end.
//!
//! Running the installer twice without changes yields the same set of links.
//!
use crate::common::fs::io::ensure_dir_exists;
use crate::common::fs::links::{create_symlink, remove_symlinks_in};
use crate::core::config::AssetsConfig;
use crate::core::error::{PmError, Result};
use std::path::PathBuf;
use tracing::{debug, error, info};

/// A dependency whose public assets were linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledAsset {
    pub name: String,
    pub version: String,
    pub source: PathBuf,
    pub target: PathBuf,
}

#[derive(Debug)]
pub struct AssetInstaller<'a> {
    config: &'a AssetsConfig,
    vendor_dir: PathBuf,
}

impl<'a> AssetInstaller<'a> {
    pub fn new(config: &'a AssetsConfig, vendor_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            vendor_dir: vendor_dir.into(),
        }
    }

    fn public_dir(&self) -> Result<PathBuf> {
        self.config
            .public_dir
            .as_ref()
            .map(PathBuf::from)
            .ok_or_else(|| {
                PmError::Config("assets.public_dir must be set to install assets".to_string())
                    .into()
            })
    }

    /// Links the assets of every `(name, version)` requirement into the public directory.
    pub fn install(&self, requirements: &[(String, String)]) -> Result<Vec<InstalledAsset>> {
        if !self.config.enabled {
            return Err(PmError::Asset("Asset installation is disabled (assets.enabled = false)".to_string()).into());
        }
        let public_dir = self.public_dir()?;

        let removed = remove_symlinks_in(&public_dir)?;
        debug!("Removed {} stale asset link(s)", removed.len());
        ensure_dir_exists(&public_dir)?;

        let mut installed = Vec::new();
        let mut failures = Vec::new();
        for (name, version) in requirements {
            let Some(source) = self.asset_source(name) else {
                debug!("No public assets found for {}", name);
                continue;
            };
            let target = public_dir.join(link_name(name));
            match create_symlink(&source, &target) {
                Ok(()) => installed.push(InstalledAsset {
                    name: name.clone(),
                    version: version.clone(),
                    source,
                    target,
                }),
                Err(e) => {
                    error!("Could not link assets of {}: {:#}", name, e);
                    failures.push(format!("{}: {:#}", name, e));
                }
            }
        }

        if !failures.is_empty() {
            return Err(PmError::Asset(format!(
                "{} asset link(s) could not be created: {}",
                failures.len(),
                failures.join("; ")
            ))
            .into());
        }
        info!("Installed assets for {} package(s)", installed.len());
        Ok(installed)
    }

    /// First configured asset path that exists inside the dependency's vendor directory.
    fn asset_source(&self, name: &str) -> Option<PathBuf> {
        let package_dir = self.vendor_dir.join(name);
        self.config
            .asset_paths
            .iter()
            .map(|candidate| package_dir.join(candidate.trim_end_matches('/')))
            .find(|path| path.exists())
    }
}

/// `vendor/package` becomes `vendor_package`.
pub fn link_name(package: &str) -> String {
    package.replace('/', "_")
}

/// Reads `(name, constraint)` pairs from a manifest's `require` section.
pub fn requirements_of(manifest: &serde_json::Value) -> Vec<(String, String)> {
    manifest
        .get("require")
        .and_then(serde_json::Value::as_object)
        .map(|require| {
            require
                .iter()
                .map(|(name, version)| {
                    (name.clone(), version.as_str().unwrap_or("*").to_string())
                })
                .collect()
        })
        .unwrap_or_default()
}
