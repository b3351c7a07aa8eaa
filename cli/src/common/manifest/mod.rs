//! # pmbridge Manifest Handling (`common::manifest`)
//!
//! File: cli/src/common/manifest/mod.rs
//!
//! ## Overview
//!
//! Produces the merged manifest the package manager is run against from the
//! manifests of several local packages.
//!
//! ## Architecture
//!
//! - **`merge`**: Key-wise JSON merging with override semantics (`merge`, `merge_with`,
//!   `merge_all`).
//! - **`collector`**: Reads each package's overlay and native manifests, applies the
//!   opt-in rule and rewrites autoload paths (`ManifestCollector`, `PackageManifest`).
//! - **`writer`**: Fills the template and merges the package sections into one
//!   document (`ManifestWriter`).
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::manifest::{ManifestCollector, ManifestWriter};
//!
//! let packages = ManifestCollector::new(&cfg.manifests, &working_dir).collect()?;
//! let writer = ManifestWriter::new(&cfg.manifests, &working_dir, cfg.vendor_dir());
//! writer.write(&packages, &writer.default_destination())?;
//! ```
//!
pub mod collector;
pub mod merge;
pub mod writer;

pub use collector::{ManifestCollector, PackageManifest};
pub use writer::ManifestWriter;
