//! # Install-Assets Command
//!
//! File: cli/src/commands/assets.rs
//!
//! `pmbridge install-assets`
//!
//! Links the public assets of all installed dependencies into `assets.public_dir` and
//! prints one `name [version]: target` line per linked dependency.
//!
use super::{support, AppContext};
use crate::core::error::{PmError, Result};
use clap::Args;

#[derive(Args, Debug)]
pub struct InstallAssetsArgs {}

pub fn handle_install_assets(_args: InstallAssetsArgs, ctx: &AppContext) -> Result<()> {
    if !ctx.config.assets.enabled {
        return Err(PmError::Asset("Asset installation is disabled (assets.enabled = false)".to_string()).into());
    }
    let assets = support::install_assets(ctx)?;
    support::print_installed_assets(&assets);
    Ok(())
}
