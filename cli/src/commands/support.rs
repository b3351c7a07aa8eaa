//! # Shared Command Plumbing
//!
//! File: cli/src/commands/support.rs
//!
//! Steps shared by several commands: collecting the package manifests, writing the
//! merged manifest, running a package-manager operation with its output streamed to
//! the terminal, and installing public assets.
//!
use super::AppContext;
use crate::common::assets::{requirements_of, AssetInstaller, InstalledAsset};
use crate::common::manifest::{ManifestCollector, ManifestWriter, PackageManifest};
use crate::common::package_manager::{CommandOutcome, PackageManagerProcess};
use crate::common::process::{OutputChunk, OutputStream};
use crate::core::error::{PmError, Result};
use anyhow::Context;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Collects the manifests of all configured packages.
pub(crate) fn collect_packages(ctx: &AppContext, graceful: bool) -> Result<Vec<PackageManifest>> {
    let runner = PackageManagerProcess::new(&ctx.config.package_manager, std::env::vars());
    let working_dir = runner.working_dir()?;
    ManifestCollector::new(&ctx.config.manifests, working_dir)
        .graceful(graceful)
        .collect()
        .context("Failed to collect package manifests")
}

fn manifest_writer<'a>(ctx: &'a AppContext, include_dev: bool) -> Result<ManifestWriter<'a>> {
    let runner = PackageManagerProcess::new(&ctx.config.package_manager, std::env::vars());
    Ok(
        ManifestWriter::new(&ctx.config.manifests, runner.working_dir()?, ctx.config.vendor_dir())
            .include_dev(include_dev),
    )
}

/// Writes the merged manifest to `destination` (default: the working directory) and
/// returns the path written.
pub(crate) fn write_merged_manifest(
    ctx: &AppContext,
    include_dev: bool,
    destination: Option<&Path>,
) -> Result<PathBuf> {
    let packages = collect_packages(ctx, false)?;
    if packages.is_empty() {
        warn!("No package declares any dependencies; writing an empty manifest.");
    }
    let writer = manifest_writer(ctx, include_dev)?;
    let destination = destination
        .map(Path::to_path_buf)
        .unwrap_or_else(|| writer.default_destination());
    writer.write(&packages, &destination)?;
    Ok(destination)
}

/// Renders the merged manifest without writing it.
pub(crate) fn render_merged_manifest(ctx: &AppContext, include_dev: bool) -> Result<String> {
    let packages = collect_packages(ctx, false)?;
    manifest_writer(ctx, include_dev)?.render(&packages)
}

/// Runs `operation`, streaming the package manager's output to stdout/stderr.
///
/// A non-zero exit code becomes `PmError::PackageManagerFailed`.
pub(crate) fn run_operation(ctx: &AppContext, operation: &str, extra: &[String]) -> Result<CommandOutcome> {
    let runner = PackageManagerProcess::new(&ctx.config.package_manager, std::env::vars())
        .with_verbosity(ctx.verbosity);

    let outcome = runner.run(operation, extra, Some(Box::new(stream_to_terminal)))?;
    if !outcome.success() {
        return Err(PmError::PackageManagerFailed {
            operation: operation.to_string(),
            exit_code: outcome.exit_code,
        }
        .into());
    }
    info!("Package manager '{}' finished successfully", operation);
    Ok(outcome)
}

fn stream_to_terminal(chunk: &OutputChunk<'_>) {
    // Write errors are ignored.
    let _ = match chunk.stream {
        OutputStream::Stdout => {
            let mut out = std::io::stdout().lock();
            out.write_all(chunk.bytes).and_then(|()| out.flush())
        }
        OutputStream::Stderr => {
            let mut err = std::io::stderr().lock();
            err.write_all(chunk.bytes).and_then(|()| err.flush())
        }
    };
}

/// Links the public assets of every dependency required by the merged manifest.
pub(crate) fn install_assets(ctx: &AppContext) -> Result<Vec<InstalledAsset>> {
    let packages = collect_packages(ctx, false)?;
    let merged = manifest_writer(ctx, false)?.build(&packages)?;
    AssetInstaller::new(&ctx.config.assets, ctx.config.vendor_dir()).install(&requirements_of(&merged))
}

/// Prints the `install-assets` report.
pub(crate) fn print_installed_assets(assets: &[InstalledAsset]) {
    if assets.is_empty() {
        println!("No assets found to install");
        return;
    }
    for asset in assets {
        println!("{} [{}]: {}", asset.name, asset.version, asset.target.display());
    }
}
