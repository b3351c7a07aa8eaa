//! # pmbridge CLI Integration Test Common Helpers
//!
//! File: cli/tests/common.rs
//!
//! ## Overview
//!
//! Shared helpers for the integration test crates in `cli/tests/`. Every test gets an
//! isolated `Sandbox`: a temporary directory acting as the current directory, the
//! home directory and the user configuration directory, so neither a developer's
//! own configuration nor their global package-manager state can leak in.
//!
//! The package manager itself is replaced by a small POSIX shell script run through
//! `/bin/sh`, configured as the entry point.
//!

// Different test files use different helpers.
#![allow(dead_code)]

pub use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Creates a command for the compiled `pmbridge` binary.
pub fn pmbridge_cmd() -> Command {
    Command::cargo_bin("pmbridge").expect("Failed to find pmbridge binary for testing")
}

/// An isolated project directory with its own configuration.
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create sandbox");
        // Stops the upward search for `.pmbridge.toml` at the sandbox.
        fs::create_dir(dir.path().join(".git")).expect("Failed to create .git marker");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn work_dir(&self) -> PathBuf {
        self.path().join("work")
    }

    pub fn public_dir(&self) -> PathBuf {
        self.path().join("public")
    }

    /// Writes `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path().join(relative);
        fs::create_dir_all(path.parent().expect("path has a parent")).expect("mkdir");
        fs::write(&path, content).expect("write");
        path
    }

    /// Writes a fake package-manager script and returns its path.
    pub fn fake_package_manager(&self, script: &str) -> PathBuf {
        self.write("bin/fake-composer.sh", script)
    }

    /// Writes `.pmbridge.toml` pointing at the fake package manager, the `packages/*`
    /// directories and the sandbox's public directory. `extra` is appended verbatim.
    pub fn write_config(&self, packages: &[&str], extra: &str) {
        let package_dirs = packages
            .iter()
            .map(|p| format!("{:?}", self.path().join("packages").join(p).display().to_string()))
            .collect::<Vec<_>>()
            .join(", ");
        let entry_point = self.path().join("bin/fake-composer.sh");
        let config = format!(
            r#"[package_manager]
executable = "/bin/sh"
entry_point = {entry:?}
working_dir = {work:?}
timeout_secs = 30

[manifests]
package_dirs = [{package_dirs}]

[assets]
public_dir = {public:?}
{extra}
"#,
            entry = entry_point.display().to_string(),
            work = self.work_dir().display().to_string(),
            public = self.public_dir().display().to_string(),
        );
        self.write(".pmbridge.toml", &config);
    }

    /// `pmbridge` running inside the sandbox with a scrubbed environment.
    pub fn cmd(&self) -> Command {
        let mut cmd = pmbridge_cmd();
        cmd.current_dir(self.path())
            .env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join(".config"))
            .env_remove("PMBRIDGE_CONFIG")
            .env_remove("RUST_LOG")
            .env_remove("COMPOSER_HOME");
        cmd
    }
}
