//! # Install Command
//!
//! File: cli/src/commands/install.rs
//!
//! `pmbridge install [--no-dev] [-- extra...]`
//!
//! Writes the merged manifest into the working directory, runs the package manager's
//! `install` operation with its output streamed to the terminal and, when
//! `assets.auto_install` is set, links the public assets afterwards.
//!
use super::{support, AppContext};
use crate::core::error::Result;
use clap::Args;
use tracing::{debug, info};

/// Arguments shared by `install` and `update`.
#[derive(Args, Debug, Clone, Default)]
pub struct OperationArgs {
    /// Leave `require-dev` out of the merged manifest and pass `--no-dev`.
    #[arg(long)]
    pub no_dev: bool,

    /// Extra arguments passed to the package manager unchanged.
    #[arg(last = true)]
    pub extra: Vec<String>,
}

impl OperationArgs {
    pub(crate) fn include_dev(&self, ctx: &AppContext) -> bool {
        ctx.config.manifests.include_dev && !self.no_dev
    }

    pub(crate) fn package_manager_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.extra.len() + 1);
        if self.no_dev {
            args.push("--no-dev".to_string());
        }
        args.extend(self.extra.iter().cloned());
        args
    }
}

pub fn handle_install(args: OperationArgs, ctx: &AppContext) -> Result<()> {
    run_with_manifest("install", &args, ctx)
}

/// Writes the manifest, runs `operation` and installs assets when configured to.
pub(crate) fn run_with_manifest(operation: &str, args: &OperationArgs, ctx: &AppContext) -> Result<()> {
    let manifest = support::write_merged_manifest(ctx, args.include_dev(ctx), None)?;
    debug!("Merged manifest written to {:?}", manifest);

    support::run_operation(ctx, operation, &args.package_manager_args())?;

    if ctx.config.assets.enabled && ctx.config.assets.auto_install {
        info!("Installing public assets");
        let assets = support::install_assets(ctx)?;
        support::print_installed_assets(&assets);
    }
    Ok(())
}
