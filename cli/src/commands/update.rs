//! # Update Command
//!
//! File: cli/src/commands/update.rs
//!
//! `pmbridge update [--no-dev] [-- extra...]`
//!
//! Same flow as `install`, running the package manager's `update` operation.
//!
use super::install::{run_with_manifest, OperationArgs};
use super::AppContext;
use crate::core::error::Result;

pub fn handle_update(args: OperationArgs, ctx: &AppContext) -> Result<()> {
    run_with_manifest("update", &args, ctx)
}
