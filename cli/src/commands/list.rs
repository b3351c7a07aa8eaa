//! # List Command
//!
//! File: cli/src/commands/list.rs
//!
//! `pmbridge list`
//!
//! Prints every collected package with its requirements:
//!
//! ```text
//! acme/blog [1.2.0]: Blog package
//!   require:
//!     league/commonmark ^2.4
//!   require-dev:
//!     phpunit/phpunit ^10
//! ```
//!
//! Manifests that cannot be read are skipped with a warning instead of failing.
//!
use super::{support, AppContext};
use crate::common::manifest::PackageManifest;
use crate::core::error::Result;
use clap::Args;
use std::fmt::Write;

#[derive(Args, Debug)]
pub struct ListArgs {}

pub fn handle_list(_args: ListArgs, ctx: &AppContext) -> Result<()> {
    let packages = support::collect_packages(ctx, true)?;
    if packages.is_empty() {
        println!("No packages with manifests found");
        return Ok(());
    }
    for package in &packages {
        print!("{}", describe(package));
    }
    Ok(())
}

fn describe(package: &PackageManifest) -> String {
    let mut text = String::new();
    let _ = write!(text, "{}", package.name());
    if let Some(version) = package.version() {
        let _ = write!(text, " [{}]", version);
    }
    let _ = writeln!(text, ": {}", package.description().unwrap_or(""));
    for section in ["require", "require-dev"] {
        let dependencies = package.dependencies(section);
        if dependencies.is_empty() {
            continue;
        }
        let _ = writeln!(text, "  {}:", section);
        for (name, constraint) in dependencies {
            let _ = writeln!(text, "    {} {}", name, constraint);
        }
    }
    text
}
