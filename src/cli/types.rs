//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::investigate::InvestigateArgs;
use super::commands::tools::ToolsArgs;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "investigator")]
#[command(about = "Budget-bounded tool orchestration for support investigations", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Read configuration from this file instead of .investigator/
    #[arg(short, long, global = true, env = "INVESTIGATOR_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Investigate a support question
    Investigate(InvestigateArgs),

    /// List the tools available to investigations
    Tools(ToolsArgs),
}
