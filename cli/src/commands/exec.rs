//! # Exec Command
//!
//! File: cli/src/commands/exec.rs
//!
//! `pmbridge exec <operation> [args...]`
//!
//! Runs an arbitrary package-manager operation (`show`, `outdated`, `why`, ...) in the
//! working directory with the same environment handling as `install`. The merged
//! manifest is not rewritten.
//!
use super::{support, AppContext};
use crate::core::error::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Package-manager operation to run.
    #[arg(required = true)]
    pub operation: String,

    /// Arguments for the operation.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

pub fn handle_exec(args: ExecArgs, ctx: &AppContext) -> Result<()> {
    support::run_operation(ctx, &args.operation, &args.args)?;
    Ok(())
}
