//! # pmbridge Configuration System
//!
//! File: cli/src/core/config.rs
//!
//! ## Overview
//!
//! This module implements the configuration system for pmbridge, handling loading,
//! layering, validation, and access to configuration data. Nothing below the command
//! layer reads configuration on its own: handlers load a `Config` once and pass the
//! relevant sections into the process runner, the manifest writer and the asset
//! installer.
//!
//! ## Architecture
//!
//! Configuration sources (later sources override earlier ones key by key):
//! 1. Default values defined in the code
//! 2. User-specific `config.toml` in the platform config directory
//! 3. Project-specific `.pmbridge.toml` in the current directory or an ancestor
//!    (the search stops at the first directory containing `.git`)
//! 4. An explicit file passed with `--config`
//!
//! Each source is parsed into a TOML table and the tables are merged recursively
//! before the result is deserialized, so a project file only needs to mention the
//! keys it changes. Paths are expanded (`~`) and the result is validated before use.
//!
//! ## Examples
//!
//! ```rust
//! let cfg = config::load_config(None)?;
//! let timeout = cfg.package_manager.timeout();
//! let vendor_dir = cfg.vendor_dir();
//! ```
//!
use crate::core::error::{PmError, Result};
use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info, warn};

/// Represents the main configuration structure, loaded from TOML files.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub package_manager: PackageManagerConfig,
    #[serde(default)]
    pub manifests: ManifestsConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
}

/// How the external package manager is invoked.
#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct PackageManagerConfig {
    /// Interpreter or binary to launch (resolved on PATH when not a path).
    pub executable: String,
    /// Script passed as the first argument (e.g. a `composer.phar`). Optional.
    pub entry_point: Option<String>,
    /// Directory holding the merged manifest; passed as `--working-dir`.
    pub working_dir: String,
    /// Private home directory for the package manager. Defaults to `<working_dir>/.home`.
    pub home_dir: Option<String>,
    /// Name of the environment variable that points the package manager at its home.
    pub home_env_var: String,
    /// Wall-clock budget for one invocation.
    pub timeout_secs: u64,
    /// Extra environment variable names forwarded on top of the built-in allowlist.
    pub inherit_env: Vec<String>,
    /// Start the package manager in its own process group and signal the whole group.
    pub isolate_process_group: bool,
}

/// Where package manifests come from and how the merged manifest is built.
#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct ManifestsConfig {
    /// Package directories, each holding an overlay and/or a native manifest.
    pub package_dirs: Vec<String>,
    /// File name of the pmbridge-specific manifest inside a package directory.
    pub overlay_file: String,
    /// File name of the package manager's own manifest inside a package directory.
    pub native_file: String,
    /// Optional JSON template for the merged manifest.
    pub template: Option<String>,
    pub minimum_stability: String,
    /// Merge `require-dev` sections into the written manifest.
    pub include_dev: bool,
}

/// Asset linking after install/update.
#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    pub enabled: bool,
    /// Run the asset installer after a successful install/update.
    pub auto_install: bool,
    /// Installed dependencies. Defaults to `<working_dir>/vendor`.
    pub vendor_dir: Option<String>,
    /// Directory that receives the asset links.
    pub public_dir: Option<String>,
    /// Candidate sub-paths inside each dependency.
    pub asset_paths: Vec<String>,
}

// --- Default values ---
fn default_working_dir() -> String {
    match dirs::data_local_dir() {
        Some(dir) => dir.join("pmbridge").join("work").to_string_lossy().into_owned(),
        None => "~/.local/share/pmbridge/work".to_string(),
    }
}

const DEFAULT_TIMEOUT_SECS: u64 = 600;

impl Default for PackageManagerConfig {
    fn default() -> Self {
        Self {
            executable: "php".to_string(),
            entry_point: None,
            working_dir: default_working_dir(),
            home_dir: None,
            home_env_var: "COMPOSER_HOME".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            inherit_env: Vec::new(),
            isolate_process_group: false,
        }
    }
}

impl Default for ManifestsConfig {
    fn default() -> Self {
        Self {
            package_dirs: Vec::new(),
            overlay_file: "pmbridge.json".to_string(),
            native_file: "composer.json".to_string(),
            template: None,
            minimum_stability: "dev".to_string(),
            include_dev: true,
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_install: false,
            vendor_dir: None,
            public_dir: None,
            asset_paths: vec!["Resources/Public/".to_string(), "build".to_string()],
        }
    }
}

impl PackageManagerConfig {
    pub fn working_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.working_dir)
    }

    /// The private home directory handed to the package manager.
    pub fn home_dir_path(&self) -> PathBuf {
        match &self.home_dir {
            Some(dir) => PathBuf::from(dir),
            None => self.working_dir_path().join(".home"),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Directory the package manager installs dependencies into.
    pub fn vendor_dir(&self) -> PathBuf {
        match &self.assets.vendor_dir {
            Some(dir) => PathBuf::from(dir),
            None => self.package_manager.working_dir_path().join("vendor"),
        }
    }
}

const PROJECT_CONFIG_FILENAME: &str = ".pmbridge.toml";

/// Loads, layers, expands and validates the configuration.
///
/// `explicit` is the file given with `--config`; it has the highest precedence.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut layers = Vec::new();
    if let Some(user) = load_user_config()? {
        layers.push(user);
    }
    if let Some(project) = load_project_config()? {
        layers.push(project);
    }
    if let Some(path) = explicit {
        info!("Loading configuration from: {}", path.display());
        layers.push(load_config_from_path(path)?);
    }
    let config = resolve_config(layers)?;
    debug!("Final loaded configuration: {:?}", config);
    Ok(config)
}

/// Merges the given layers (lowest precedence first) into a validated `Config`.
pub fn resolve_config(layers: Vec<toml::Table>) -> Result<Config> {
    let mut merged = toml::Table::new();
    for layer in layers {
        merge_tables(&mut merged, layer);
    }
    let mut config = toml::Value::Table(merged)
        .try_into::<Config>()
        .context("Failed to interpret configuration")?;
    expand_config_paths(&mut config).context("Failed to expand paths in configuration")?;
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

fn load_user_config() -> Result<Option<toml::Table>> {
    if let Some(proj_dirs) = ProjectDirs::from("com", "Pmbridge", "pmbridge") {
        let config_path = proj_dirs.config_dir().join("config.toml");
        if config_path.exists() {
            info!("Loading user configuration from: {}", config_path.display());
            load_config_from_path(&config_path).map(Some)
        } else {
            debug!(
                "User configuration file not found at {}",
                config_path.display()
            );
            Ok(None)
        }
    } else {
        warn!("Could not determine user config directory.");
        Ok(None)
    }
}

fn load_project_config() -> Result<Option<toml::Table>> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    if let Some(project_config_path) = find_project_config_path(&current_dir) {
        info!(
            "Loading project configuration from: {}",
            project_config_path.display()
        );
        load_config_from_path(&project_config_path).map(Some)
    } else {
        debug!("No project configuration file (.pmbridge.toml) found in current directory or ancestors.");
        Ok(None)
    }
}

fn find_project_config_path(start: &Path) -> Option<PathBuf> {
    let mut path: &Path = start;
    loop {
        let project_config = path.join(PROJECT_CONFIG_FILENAME);
        if project_config.is_file() {
            return Some(project_config);
        }
        if path.join(".git").is_dir() {
            debug!(
                "Found .git directory at {}, stopping project config search.",
                path.display()
            );
            return None;
        }
        path = path.parent()?;
    }
}

fn load_config_from_path(path: &Path) -> Result<toml::Table> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    content
        .parse::<toml::Table>()
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

/// Recursively overlays `overlay` onto `base`; nested tables merge, everything else is replaced.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn expand(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

fn expand_config_paths(config: &mut Config) -> Result<()> {
    debug!("Expanding paths in configuration...");
    let pm = &mut config.package_manager;
    pm.working_dir = expand(&pm.working_dir);
    pm.home_dir = pm.home_dir.as_deref().map(expand);
    pm.entry_point = pm.entry_point.as_deref().map(expand);
    if pm.executable.contains('/') {
        pm.executable = expand(&pm.executable);
    }

    let manifests = &mut config.manifests;
    for dir in &mut manifests.package_dirs {
        *dir = expand(dir);
    }
    manifests.template = manifests.template.as_deref().map(expand);

    let assets = &mut config.assets;
    assets.vendor_dir = assets.vendor_dir.as_deref().map(expand);
    assets.public_dir = assets.public_dir.as_deref().map(expand);
    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    info!("Validating final configuration...");
    let pm = &config.package_manager;
    if pm.executable.trim().is_empty() {
        return Err(anyhow!(PmError::Config(
            "package_manager.executable cannot be empty.".to_string()
        )));
    }
    if pm.timeout_secs == 0 {
        return Err(anyhow!(PmError::Config(
            "package_manager.timeout_secs must be greater than zero.".to_string()
        )));
    }
    if pm.home_env_var.trim().is_empty() {
        return Err(anyhow!(PmError::Config(
            "package_manager.home_env_var cannot be empty.".to_string()
        )));
    }
    if let Some(entry_point) = &pm.entry_point {
        if !Path::new(entry_point).is_file() {
            warn!("Configured entry point '{}' does not exist.", entry_point);
        }
    }

    for dir in &config.manifests.package_dirs {
        let path = Path::new(dir);
        if !path.exists() {
            warn!("Configured package directory '{}' does not exist.", dir);
        } else if !path.is_dir() {
            return Err(anyhow!(PmError::Config(format!(
                "Configured package path '{}' exists but is not a directory.",
                dir
            ))));
        }
    }
    if let Some(template) = &config.manifests.template {
        if !Path::new(template).is_file() {
            return Err(anyhow!(PmError::Config(format!(
                "Manifest template '{}' does not exist.",
                template
            ))));
        }
    }

    if config.assets.asset_paths.iter().any(|p| p.trim().is_empty()) {
        return Err(anyhow!(PmError::Config(
            "assets.asset_paths cannot contain empty entries.".to_string()
        )));
    }
    if let Some(public_dir) = &config.assets.public_dir {
        let path = Path::new(public_dir);
        if path.exists() && !path.is_dir() {
            return Err(anyhow!(PmError::Config(format!(
                "Configured public path '{}' exists but is not a directory.",
                public_dir
            ))));
        }
    }
    info!("Configuration validation successful.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn table(content: &str) -> toml::Table {
        content.parse::<toml::Table>().expect("Failed to parse TOML")
    }

    #[test]
    fn test_deserialize_basic_toml() {
        let config = resolve_config(vec![table(
            r#"
            [package_manager]
            executable = "/usr/bin/php8.2"
            timeout_secs = 30
            inherit_env = ["SSH_AUTH_SOCK"]

            [assets]
            public_dir = "/srv/public/assets"
        "#,
        )])
        .unwrap();

        assert_eq!(config.package_manager.executable, "/usr/bin/php8.2");
        assert_eq!(config.package_manager.timeout(), Duration::from_secs(30));
        assert_eq!(config.package_manager.inherit_env, vec!["SSH_AUTH_SOCK"]);
        assert_eq!(config.package_manager.home_env_var, "COMPOSER_HOME"); // Default
        assert_eq!(config.manifests.overlay_file, "pmbridge.json"); // Default
        assert!(config.manifests.include_dev);
        assert_eq!(
            config.assets.asset_paths,
            vec!["Resources/Public/".to_string(), "build".to_string()]
        );
        assert_eq!(
            config.assets.public_dir.as_deref(),
            Some("/srv/public/assets")
        );
    }

    #[test]
    fn test_later_layers_override_per_key() {
        let config = resolve_config(vec![
            table(
                r#"
                [package_manager]
                executable = "php7"
                timeout_secs = 30
            "#,
            ),
            table(
                r#"
                [package_manager]
                timeout_secs = 90
            "#,
            ),
        ])
        .unwrap();
        assert_eq!(config.package_manager.executable, "php7");
        assert_eq!(config.package_manager.timeout_secs, 90);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = resolve_config(vec![table(
            r#"
            [package_manager]
            timeout = 5
        "#,
        )]);
        assert!(result.is_err());
    }

    #[test]
    fn test_path_expansion() {
        let mut config = Config::default();
        config.package_manager.working_dir = "~/pm_work".to_string();
        config.manifests.package_dirs = vec!["~/ext/a".to_string(), "/abs/b".to_string()];

        expand_config_paths(&mut config).unwrap();

        let home_dir = dirs::home_dir().unwrap();
        assert_eq!(
            config.package_manager.working_dir,
            home_dir.join("pm_work").to_string_lossy()
        );
        assert_eq!(
            config.manifests.package_dirs[0],
            home_dir.join("ext/a").to_string_lossy()
        );
        assert_eq!(config.manifests.package_dirs[1], "/abs/b"); // Absolute path unchanged
    }

    #[test]
    fn test_home_and_vendor_defaults_follow_working_dir() {
        let mut config = Config::default();
        config.package_manager.working_dir = "/tmp/pm".to_string();
        assert_eq!(
            config.package_manager.home_dir_path(),
            PathBuf::from("/tmp/pm/.home")
        );
        assert_eq!(config.vendor_dir(), PathBuf::from("/tmp/pm/vendor"));
    }

    #[test]
    fn test_validate_config_zero_timeout() {
        let mut config = Config::default();
        config.package_manager.timeout_secs = 0;
        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("timeout_secs must be greater than zero"));
    }

    #[test]
    fn test_validate_config_package_path_is_file() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("not_a_dir");
        fs::write(&file_path, "").unwrap();

        let mut config = Config::default();
        config.manifests.package_dirs = vec![file_path.to_string_lossy().to_string()];
        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("is not a directory"));
    }

    #[test]
    fn test_find_project_config_stops_at_git() {
        let root = tempdir().unwrap();
        let repo = root.path().join("repo");
        let nested = repo.join("a/b");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir(repo.join(".git")).unwrap();
        // Above the repository boundary, must not be found.
        fs::write(root.path().join(PROJECT_CONFIG_FILENAME), "").unwrap();
        assert_eq!(find_project_config_path(&nested), None);

        fs::write(repo.join("a").join(PROJECT_CONFIG_FILENAME), "").unwrap();
        assert_eq!(
            find_project_config_path(&nested),
            Some(repo.join("a").join(PROJECT_CONFIG_FILENAME))
        );
    }
}
