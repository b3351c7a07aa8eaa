//! # pmbridge Error Types
//!
//! File: cli/src/core/error.rs
//!
//! ## Overview
//!
//! This module defines the application-level error type used by the command
//! handlers and the collaborators around the process core (configuration,
//! manifests, assets). The process core itself carries its own typed error
//! (`common::process::ProcessError`), which converts into `PmError::Process`.
//!
//! ## Architecture
//!
//! The error system consists of two main components:
//! - `PmError`: A custom error enum using `thiserror` for specific error types
//! - `Result<T>`: A type alias for `anyhow::Result<T>` for flexible error handling
//!
//! The error types cover various domains:
//! - Configuration errors
//! - Filesystem errors
//! - Manifest (JSON) errors
//! - Asset installation errors
//! - Package-manager invocation errors
//!
//! ## Examples
//!
//! ```rust
//! // Return a specific error type
//! if !path.exists() {
//!     return Err(PmError::FileSystem(format!("Path not found: {}", path.display())))?;
//! }
//!
//! // Add context to errors using anyhow
//! let content = fs::read_to_string(&path)
//!     .with_context(|| format!("Failed to read file: {}", path.display()))?;
//!
//! // Pattern matching on error types
//! match result {
//!     Err(e) if e.downcast_ref::<PmError>().map_or(false, |pe| matches!(pe, PmError::PackageManagerFailed { .. })) => {
//!         println!("The package manager reported a failure");
//!     },
//!     other => other?,
//! }
//! ```
//!
use crate::common::process::ProcessError;
use thiserror::Error;

/// Custom error type for the pmbridge application.
#[derive(Error, Debug)]
pub enum PmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Filesystem error: {0}")]
    FileSystem(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Asset installation error: {0}")]
    Asset(String),

    #[error("Executable '{name}' could not be found")]
    ExecutableNotFound { name: String },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Package manager '{operation}' failed with exit code {exit_code}")]
    PackageManagerFailed { operation: String, exit_code: i32 },
}

/// Type alias for Result using anyhow::Error for broad compatibility.
pub type Result<T> = anyhow::Result<T>;

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let config_err = PmError::Config("Missing setting 'foo'".to_string());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: Missing setting 'foo'"
        );

        let not_found = PmError::ExecutableNotFound {
            name: "php".into(),
        };
        assert_eq!(not_found.to_string(), "Executable 'php' could not be found");

        let failed = PmError::PackageManagerFailed {
            operation: "install".into(),
            exit_code: 2,
        };
        assert_eq!(
            failed.to_string(),
            "Package manager 'install' failed with exit code 2"
        );
    }

    #[test]
    fn test_process_error_converts() {
        let timeout = ProcessError::Timeout {
            timeout: Duration::from_secs(3),
            partial_output: "partial".into(),
        };
        let err: PmError = timeout.into();
        assert!(matches!(err, PmError::Process(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_error_chain_names_each_cause_once() {
        let start = ProcessError::Start {
            command: "bin/php install".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
        };
        let err = anyhow::Error::from(PmError::from(start));
        assert_eq!(
            format!("{:#}", err),
            "Failed to start 'bin/php install': No such file or directory"
        );
    }
}
