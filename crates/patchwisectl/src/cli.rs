//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution logic.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Patchwise CLI
#[derive(Debug, Parser)]
#[command(name = "patchwisectl")]
#[command(about = "Patchwise - check for and apply versioned update packages", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "patchwise.toml")]
    pub config: PathBuf,

    /// Override the installed version from the config file
    #[arg(long, global = true)]
    pub current_version: Option<String>,

    /// Output JSON only
    #[arg(long, global = true)]
    pub json: bool,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch the catalog and show pending versions
    Check,

    /// Dry run every pending version without touching installed files
    Simulate,

    /// Download and install every pending version
    Update {
        /// Keep staged packages after installing them
        #[arg(long)]
        keep_staged: bool,
    },
}
