//! # pmbridge Main Entry Point
//!
//! File: cli/src/main.rs
//!
//! ## Overview
//!
//! This file serves as the main entry point for the pmbridge CLI application.
//! It handles:
//! - Command-line argument parsing using Clap
//! - Setting up the logging system based on verbosity flags
//! - Loading the layered configuration
//! - Routing execution to the command handlers
//!
//! ## Architecture
//!
//! - Each top-level command is a variant of the `Commands` enum
//! - Commands map to `handle_*` functions in `commands::*`, which receive an
//!   `AppContext` holding the configuration and the verbosity
//! - All errors propagate to this level, are printed as `Error: ...` and end the
//!   process with exit status 1
//!
//! ## Examples
//!
//! ```bash
//! # Merge the package manifests and install dependencies
//! pmbridge install
//!
//! # Update without development dependencies, passing an extra flag through
//! pmbridge -v update --no-dev -- --prefer-dist
//!
//! # Run any other package-manager operation
//! pmbridge exec show --tree
//!
//! # Use an explicit configuration file
//! pmbridge --config ./ci.toml install-assets
//! ```
//!
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod common;
mod core;

use commands::AppContext;

/// Defines the top-level command-line arguments structure using Clap's derive macros.
#[derive(Parser, Debug)]
#[command(
    name = "pmbridge",
    about = "pmbridge: merged manifests, supervised package-manager runs and asset links",
    long_about = "Merges the manifests of local packages into one, runs the package manager \
                  against it with a controlled environment and timeout, and links the public \
                  assets of installed dependencies.",
    propagate_version = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log output; also forwarded to the package manager (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file with the highest precedence.
    #[arg(long, global = true, env = "PMBRIDGE_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Enum defining all available top-level commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the merged manifest and install dependencies.
    #[command(alias = "i")]
    Install(commands::install::OperationArgs),
    /// Write the merged manifest and update dependencies.
    #[command(alias = "u")]
    Update(commands::install::OperationArgs),
    /// Run an arbitrary package-manager operation.
    Exec(commands::exec::ExecArgs),
    /// Write the merged manifest without running the package manager.
    WriteManifest(commands::manifest::WriteManifestArgs),
    /// Link public assets of installed dependencies.
    InstallAssets(commands::assets::InstallAssetsArgs),
    /// List collected packages and their requirements.
    #[command(alias = "ls")]
    List(commands::list::ListArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    if let Err(e) = run(cli) {
        tracing::error!("Command execution failed: {:?}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn run(cli: Cli) -> crate::core::error::Result<()> {
    let config = crate::core::config::load_config(cli.config.as_deref())?;
    let ctx = AppContext {
        config,
        verbosity: cli.verbose,
    };

    match cli.command {
        Commands::Install(args) => commands::install::handle_install(args, &ctx),
        Commands::Update(args) => commands::update::handle_update(args, &ctx),
        Commands::Exec(args) => commands::exec::handle_exec(args, &ctx),
        Commands::WriteManifest(args) => commands::manifest::handle_write_manifest(args, &ctx),
        Commands::InstallAssets(args) => commands::assets::handle_install_assets(args, &ctx),
        Commands::List(args) => commands::list::handle_list(args, &ctx),
    }
}
