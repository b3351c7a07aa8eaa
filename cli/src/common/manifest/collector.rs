//! # Package Manifest Collection
//!
//! File: cli/src/common/manifest/collector.rs
//!
//! ## Overview
//!
//! Reads the manifests of every configured package directory and turns each into one
//! `PackageManifest`. A package can carry two files:
//!
//! - the overlay manifest (`pmbridge.json` by default), always used when present;
//! - the native manifest (`composer.json` by default), merged over the overlay only
//!   when it opts in with `"extra": {"pmbridge": {"install": true}}`.
//!
//! Autoload paths in a manifest are relative to the package. The merged manifest lives
//! in the package manager's working directory, so `classmap`, `psr-0`, `psr-4` and
//! `files` entries are rewritten relative to that directory. Any other autoload type
//! is rejected.
//!
//! In graceful mode unreadable manifests and unknown autoload types are logged and
//! skipped instead of failing the whole collection; `pmbridge list` uses this.
//!
use super::merge::merge;
use crate::core::config::ManifestsConfig;
use crate::core::error::{PmError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key under `extra` that native manifests use to opt in.
pub const EXTRA_KEY: &str = "pmbridge";

/// Autoload types whose paths are rewritten.
const AUTOLOAD_TYPES: &[&str] = &["classmap", "psr-0", "psr-4", "files"];

/// The effective manifest of one package.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageManifest {
    /// Name of the package directory.
    pub key: String,
    pub dir: PathBuf,
    pub manifest: Map<String, Value>,
}

impl PackageManifest {
    /// The manifest's `name`, falling back to the directory name.
    pub fn name(&self) -> &str {
        self.string_field("name").unwrap_or(&self.key)
    }

    pub fn version(&self) -> Option<&str> {
        self.string_field("version")
    }

    pub fn description(&self) -> Option<&str> {
        self.string_field("description")
    }

    /// Entries of a dependency map such as `require` or `require-dev`.
    pub fn dependencies(&self, key: &str) -> Vec<(&str, &str)> {
        self.manifest
            .get(key)
            .and_then(Value::as_object)
            .map(|deps| {
                deps.iter()
                    .map(|(name, constraint)| (name.as_str(), constraint.as_str().unwrap_or("*")))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn string_field(&self, key: &str) -> Option<&str> {
        self.manifest.get(key).and_then(Value::as_str)
    }
}

/// Collects package manifests from the configured package directories.
#[derive(Debug)]
pub struct ManifestCollector<'a> {
    config: &'a ManifestsConfig,
    working_dir: PathBuf,
    graceful: bool,
}

impl<'a> ManifestCollector<'a> {
    /// `working_dir` is where the merged manifest will be written; autoload paths are
    /// made relative to it.
    pub fn new(config: &'a ManifestsConfig, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            working_dir: working_dir.into(),
            graceful: false,
        }
    }

    pub fn graceful(mut self, graceful: bool) -> Self {
        self.graceful = graceful;
        self
    }

    /// Returns the manifests of all packages that declare something, ordered by key.
    pub fn collect(&self) -> Result<Vec<PackageManifest>> {
        let mut packages = BTreeMap::new();
        for dir in &self.config.package_dirs {
            let dir = absolute(Path::new(dir))?;
            let key = dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| dir.to_string_lossy().into_owned());

            if let Some(manifest) = self.collect_package(&key, &dir)? {
                if packages.contains_key(&key) {
                    warn!("Package key '{}' appears more than once; the later one wins", key);
                }
                packages.insert(key.clone(), PackageManifest { key, dir, manifest });
            }
        }
        debug!("Collected {} package manifest(s)", packages.len());
        Ok(packages.into_values().collect())
    }

    fn collect_package(&self, key: &str, dir: &Path) -> Result<Option<Map<String, Value>>> {
        let overlay_path = dir.join(&self.config.overlay_file);
        let native_path = dir.join(&self.config.native_file);
        if !overlay_path.is_file() && !native_path.is_file() {
            debug!("No manifests in {:?}", dir);
            return Ok(None);
        }

        let mut merged = Value::Object(Map::new());
        if overlay_path.is_file() {
            if let Some(overlay) = self.read_manifest(&overlay_path)? {
                merge(&mut merged, Value::Object(overlay));
            }
        }
        if native_path.is_file() {
            if let Some(native) = self.read_manifest(&native_path)? {
                if is_marked_for_installation(&native) {
                    debug!("Native manifest of '{}' is marked for installation", key);
                    merge(&mut merged, Value::Object(native));
                }
            }
        }

        let Value::Object(mut manifest) = merged else {
            return Ok(None);
        };
        if manifest.is_empty() {
            return Ok(None);
        }
        self.rewrite_autoload_paths(key, dir, &mut manifest)?;
        Ok(Some(manifest))
    }

    fn read_manifest(&self, path: &Path) -> Result<Option<Map<String, Value>>> {
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                match serde_json::from_str::<Value>(&content).map_err(|e| e.to_string())? {
                    Value::Object(map) => Ok(map),
                    _ => Err("top-level value is not an object".to_string()),
                }
            });
        match parsed {
            Ok(map) => Ok(Some(map)),
            Err(reason) if self.graceful => {
                warn!("Skipping manifest {:?}: {}", path, reason);
                Ok(None)
            }
            Err(reason) => Err(PmError::Manifest(format!(
                "Could not parse manifest {}: {}",
                path.display(),
                reason
            ))
            .into()),
        }
    }

    fn rewrite_autoload_paths(
        &self,
        key: &str,
        dir: &Path,
        manifest: &mut Map<String, Value>,
    ) -> Result<()> {
        let Some(Value::Object(autoload)) = manifest.get_mut("autoload") else {
            return Ok(());
        };
        let prefix = relative_prefix(dir, &self.working_dir);

        for (autoload_type, entries) in autoload.iter_mut() {
            if !AUTOLOAD_TYPES.contains(&autoload_type.as_str()) {
                let message = format!(
                    "Unknown autoload type '{}' in package '{}'",
                    autoload_type, key
                );
                if self.graceful {
                    warn!("{}", message);
                    continue;
                }
                return Err(PmError::Manifest(message).into());
            }
            rewrite_paths(entries, &prefix);
        }
        Ok(())
    }
}

/// True when a native manifest has `extra.pmbridge.install == true`.
pub fn is_marked_for_installation(native: &Map<String, Value>) -> bool {
    native
        .get("extra")
        .and_then(|extra| extra.get(EXTRA_KEY))
        .and_then(|section| section.get("install"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Rewrites every path string in an autoload section. Handles both list sections
/// (`classmap`, `files`) and namespace maps whose values are a path or a list of paths.
fn rewrite_paths(entries: &mut Value, prefix: &str) {
    match entries {
        Value::String(path) => *path = format!("{}{}", prefix, path),
        Value::Array(items) => items.iter_mut().for_each(|item| rewrite_paths(item, prefix)),
        Value::Object(map) => map.values_mut().for_each(|value| rewrite_paths(value, prefix)),
        _ => {}
    }
}

/// Path from `working_dir` to `dir`, with a trailing slash; empty when they match.
fn relative_prefix(dir: &Path, working_dir: &Path) -> String {
    let relative = pathdiff::diff_paths(dir, working_dir).unwrap_or_else(|| dir.to_path_buf());
    let relative = relative.to_string_lossy();
    if relative.is_empty() {
        String::new()
    } else {
        format!("{}/", relative.trim_end_matches('/'))
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}
