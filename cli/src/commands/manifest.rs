//! # Write-Manifest Command
//!
//! File: cli/src/commands/manifest.rs
//!
//! `pmbridge write-manifest [--no-dev] [OUTPUT|-]`
//!
//! Writes the merged manifest without running the package manager. The default
//! destination is `<working_dir>/composer.json`; `-` prints it to stdout.
//!
use super::{support, AppContext};
use crate::core::error::Result;
use clap::Args;
use std::io::Write;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct WriteManifestArgs {
    /// Leave `require-dev` out of the merged manifest.
    #[arg(long)]
    pub no_dev: bool,

    /// Destination file, or `-` for stdout.
    pub output: Option<PathBuf>,
}

pub fn handle_write_manifest(args: WriteManifestArgs, ctx: &AppContext) -> Result<()> {
    let include_dev = ctx.config.manifests.include_dev && !args.no_dev;
    match args.output {
        Some(path) if path.as_os_str() == "-" => {
            let rendered = support::render_merged_manifest(ctx, include_dev)?;
            std::io::stdout().lock().write_all(rendered.as_bytes())?;
        }
        destination => {
            let written = support::write_merged_manifest(ctx, include_dev, destination.as_deref())?;
            println!("Wrote merged manifest to {}", written.display());
        }
    }
    Ok(())
}
