//! # Package Manager Invocation (`common::package_manager`)
//!
//! File: cli/src/common/package_manager.rs
//!
//! ## Overview
//!
//! `PackageManagerProcess` turns a package-manager operation (`install`, `update`,
//! or anything passed through `pmbridge exec`) into a supervised `Process`: it builds
//! the argument list, filters the caller's environment down to an allowlist, points
//! the package manager at a private home directory and returns the captured output
//! together with the exit code.
//!
//! ## Architecture
//!
//! The argument list always has the shape
//!
//! ```text
//! <executable> [<entry-point>] <operation> --working-dir <dir> --no-interaction [-v|-vv|-vvv] [extra...]
//! ```
//!
//! The environment is never inherited wholesale. Only the names in
//! `ALLOWED_ENV_VARS` (plus `package_manager.inherit_env`) are copied from the ambient
//! snapshot handed to `new`, and the home variable (`COMPOSER_HOME` by default) is
//! always overridden so a user's global package-manager state never leaks in.
//!
//! The exit code is returned as data; interpreting it is the caller's job.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::package_manager::PackageManagerProcess;
//!
//! let runner = PackageManagerProcess::new(&cfg.package_manager, std::env::vars()).with_verbosity(1);
//! let outcome = runner.run("install", &[], None)?;
//! if outcome.exit_code != 0 { /* ... */ }
//! ```
//!
use crate::common::fs::io::ensure_dir_exists;
use crate::common::process::{OutputCallback, Process};
use crate::core::config::PackageManagerConfig;
use crate::core::error::{PmError, Result};
use anyhow::Context;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variables passed through to the package manager when set.
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "COMPOSER",
    "COMPOSER_ROOT_VERSION",
    "COMPOSER_VENDOR_DIR",
    "COMPOSER_BIN_DIR",
    "http_proxy",
    "https_proxy",
    "ftp_proxy",
    "HTTP_PROXY",
    "no_proxy",
    "HTTP_PROXY_REQUEST_FULLURI",
    "COMPOSER_CACHE_DIR",
    "COMPOSER_PROCESS_TIMEOUT",
    "COMPOSER_CAFILE",
    "COMPOSER_AUTH",
    "COMPOSER_DISCARD_CHANGES",
    "COMPOSER_NO_INTERACTION",
    "COMPOSER_ALLOW_SUPERUSER",
    "COMPOSER_MIRROR_PATH_REPOS",
    "PHP_INI_SCAN_DIR",
    "PATH",
];

/// Result of one package-manager invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Combined stdout and stderr.
    pub output: String,
    /// The package manager's exit status, `-1` if it had none.
    pub exit_code: i32,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Builds and runs package-manager invocations for one configuration.
#[derive(Debug)]
pub struct PackageManagerProcess<'a> {
    config: &'a PackageManagerConfig,
    ambient_env: BTreeMap<String, String>,
    verbosity: u8,
}

impl<'a> PackageManagerProcess<'a> {
    /// `ambient_env` is the environment to pick allowlisted variables from,
    /// usually `std::env::vars()`.
    pub fn new<I, K, V>(config: &'a PackageManagerConfig, ambient_env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            config,
            ambient_env: ambient_env
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            verbosity: 0,
        }
    }

    /// Number of `-v` flags forwarded to the package manager (capped at three).
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Absolute working directory the package manager runs in.
    pub fn working_dir(&self) -> Result<PathBuf> {
        absolute(&self.config.working_dir_path())
    }

    fn home_dir(&self) -> Result<PathBuf> {
        absolute(&self.config.home_dir_path())
    }

    /// Arguments following the executable.
    ///
    /// A relative entry point is resolved against the caller's directory, since the
    /// package manager itself runs inside the working directory.
    pub fn build_arguments(&self, operation: &str, extra: &[String]) -> Result<Vec<String>> {
        let mut arguments = Vec::with_capacity(extra.len() + 6);
        if let Some(entry_point) = &self.config.entry_point {
            arguments.push(absolute(Path::new(entry_point))?.to_string_lossy().into_owned());
        }
        arguments.push(operation.to_string());
        arguments.push("--working-dir".to_string());
        arguments.push(self.working_dir()?.to_string_lossy().into_owned());
        arguments.push("--no-interaction".to_string());
        if let Some(flag) = verbosity_flag(self.verbosity) {
            arguments.push(flag.to_string());
        }
        arguments.extend(extra.iter().cloned());
        Ok(arguments)
    }

    /// The child's complete environment: allowlisted ambient variables plus the
    /// private home directory.
    pub fn build_environment(&self) -> Result<BTreeMap<String, String>> {
        let mut environment: BTreeMap<String, String> = ALLOWED_ENV_VARS
            .iter()
            .copied()
            .chain(self.config.inherit_env.iter().map(String::as_str))
            .filter_map(|name| {
                self.ambient_env
                    .get(name)
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect();
        environment.insert(
            self.config.home_env_var.clone(),
            self.home_dir()?.to_string_lossy().into_owned(),
        );
        Ok(environment)
    }

    /// Locates the configured executable. Bare names are looked up on the ambient `PATH`;
    /// paths are made absolute against the caller's directory.
    pub fn resolve_executable(&self) -> Result<PathBuf> {
        let executable = &self.config.executable;
        let not_found = || PmError::ExecutableNotFound {
            name: executable.clone(),
        };

        if executable.contains('/') {
            let path = absolute(Path::new(executable))?;
            return if path.is_file() {
                Ok(path)
            } else {
                Err(not_found().into())
            };
        }

        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        which::which_in(executable, self.ambient_env.get("PATH"), cwd).map_err(|e| {
            debug!("Lookup of '{}' failed: {}", executable, e);
            not_found().into()
        })
    }

    /// Runs `operation` to completion, streaming output to `on_output`.
    ///
    /// Creates the working and home directories when missing. A non-zero exit code
    /// is returned in the outcome, not as an error.
    pub fn run(
        &self,
        operation: &str,
        extra: &[String],
        on_output: Option<OutputCallback<'_>>,
    ) -> Result<CommandOutcome> {
        let executable = self.resolve_executable()?;
        let working_dir = self.working_dir()?;
        ensure_dir_exists(&working_dir)?;
        ensure_dir_exists(&self.home_dir()?)?;

        let mut process = Process::new(executable.to_string_lossy())
            .args(self.build_arguments(operation, extra)?)
            .envs(self.build_environment()?)
            .working_directory(&working_dir)
            .timeout(self.config.timeout())
            .isolate_process_group(self.config.isolate_process_group);

        info!("Running package manager: {}", process.command_line());
        let output = process.execute(on_output).map_err(PmError::from)?;
        let exit_code = process.exit_code();
        debug!("Package manager '{}' exited with {}", operation, exit_code);
        Ok(CommandOutcome { output, exit_code })
    }
}

fn verbosity_flag(verbosity: u8) -> Option<&'static str> {
    match verbosity {
        0 => None,
        1 => Some("-v"),
        2 => Some("-vv"),
        _ => Some("-vvv"),
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn config_in(dir: &TempDir) -> PackageManagerConfig {
        PackageManagerConfig {
            executable: "/bin/sh".to_string(),
            working_dir: dir.path().join("work").to_string_lossy().into_owned(),
            ..PackageManagerConfig::default()
        }
    }

    #[test]
    fn test_build_arguments_shape() -> Result<()> {
        let dir = tempdir()?;
        let mut config = config_in(&dir);
        config.entry_point = Some("/opt/composer.phar".to_string());
        let runner = PackageManagerProcess::new(&config, Vec::<(String, String)>::new())
            .with_verbosity(2);

        let args = runner.build_arguments("update", &["--dry-run".to_string()])?;
        let working_dir = dir.path().join("work").to_string_lossy().into_owned();
        assert_eq!(
            args,
            vec![
                "/opt/composer.phar",
                "update",
                "--working-dir",
                working_dir.as_str(),
                "--no-interaction",
                "-vv",
                "--dry-run",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_verbosity_is_capped() {
        assert_eq!(verbosity_flag(0), None);
        assert_eq!(verbosity_flag(1), Some("-v"));
        assert_eq!(verbosity_flag(7), Some("-vvv"));
    }

    #[test]
    fn test_environment_is_filtered_and_home_forced() -> Result<()> {
        let dir = tempdir()?;
        let mut config = config_in(&dir);
        config.inherit_env = vec!["SSH_AUTH_SOCK".to_string()];
        let ambient = vec![
            ("PATH", "/usr/bin:/bin"),
            ("COMPOSER_AUTH", "{}"),
            ("HOME", "/home/someone"),
            ("SECRET_TOKEN", "hunter2"),
            ("SSH_AUTH_SOCK", "/tmp/agent"),
            ("COMPOSER_HOME", "/home/someone/.composer"),
        ];
        let runner = PackageManagerProcess::new(&config, ambient);

        let env = runner.build_environment()?;
        assert_eq!(env.get("PATH").map(String::as_str), Some("/usr/bin:/bin"));
        assert_eq!(env.get("COMPOSER_AUTH").map(String::as_str), Some("{}"));
        assert_eq!(env.get("SSH_AUTH_SOCK").map(String::as_str), Some("/tmp/agent"));
        assert!(!env.contains_key("HOME"));
        assert!(!env.contains_key("SECRET_TOKEN"));
        let home = dir.path().join("work/.home").to_string_lossy().into_owned();
        assert_eq!(env.get("COMPOSER_HOME"), Some(&home));
        Ok(())
    }

    #[test]
    fn test_missing_executable_is_reported() -> Result<()> {
        let dir = tempdir()?;
        let mut config = config_in(&dir);
        config.executable = "pmbridge-definitely-missing-binary".to_string();
        let runner = PackageManagerProcess::new(&config, vec![("PATH", "/usr/bin:/bin")]);
        let err = runner.run("install", &[], None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PmError>(),
            Some(PmError::ExecutableNotFound { .. })
        ));
        assert!(err.to_string().contains("could not be found"));
        Ok(())
    }

    #[test]
    fn test_bare_name_resolved_on_ambient_path() -> Result<()> {
        let dir = tempdir()?;
        let mut config = config_in(&dir);
        config.executable = "sh".to_string();
        let runner = PackageManagerProcess::new(&config, vec![("PATH", "/bin")]);
        assert_eq!(runner.resolve_executable()?, PathBuf::from("/bin/sh"));
        Ok(())
    }

    #[test]
    fn test_relative_paths_resolve_against_caller_directory() -> Result<()> {
        let dir = tempdir()?;
        let bin = dir.path().join("bin");
        fs::create_dir_all(&bin)?;
        fs::write(bin.join("entry.sh"), "echo \"entry ran in $(pwd)\"\n")?;

        let cwd = std::env::current_dir()?;
        let relative = |path: &Path| {
            pathdiff::diff_paths(path, &cwd)
                .unwrap()
                .to_string_lossy()
                .into_owned()
        };
        let mut config = config_in(&dir);
        config.executable = relative(Path::new("/bin/sh"));
        config.entry_point = Some(relative(&bin.join("entry.sh")));
        assert!(config.executable.contains('/') && !config.executable.starts_with('/'));
        let runner = PackageManagerProcess::new(&config, vec![("PATH", "/usr/bin:/bin")]);

        assert_eq!(runner.resolve_executable()?, cwd.join(&config.executable));
        let outcome = runner.run("install", &[], None)?;
        assert_eq!(outcome.exit_code, 0, "output: {}", outcome.output);
        assert!(outcome.output.contains("entry ran in"));
        Ok(())
    }

    #[test]
    fn test_run_captures_output_and_exit_code() -> Result<()> {
        let dir = tempdir()?;
        let script = dir.path().join("fake-composer.sh");
        fs::write(
            &script,
            "echo \"args: $*\"\necho \"home: $COMPOSER_HOME\"\nexit 3\n",
        )?;
        let mut config = config_in(&dir);
        config.entry_point = Some(script.to_string_lossy().into_owned());
        let runner = PackageManagerProcess::new(&config, vec![("PATH", "/usr/bin:/bin")]);

        let mut streamed = String::new();
        let outcome = runner.run(
            "install",
            &["--prefer-dist".to_string()],
            Some(Box::new(|chunk: &crate::common::process::OutputChunk<'_>| {
                streamed.push_str(&chunk.text())
            })),
        )?;

        let work = dir.path().join("work");
        assert_eq!(outcome.exit_code, 3);
        assert!(!outcome.success());
        assert!(outcome.output.contains(&format!(
            "args: install --working-dir {} --no-interaction --prefer-dist",
            work.display()
        )));
        assert!(outcome
            .output
            .contains(&format!("home: {}", work.join(".home").display())));
        assert_eq!(streamed, outcome.output);
        assert!(work.join(".home").is_dir());
        Ok(())
    }
}
