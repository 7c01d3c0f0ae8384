//! CLI module for azstack
//!
//! This module contains the command-line interface definitions using clap.

pub mod commands;
pub mod output;

use azstack::stacks::StackKind;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// azstack - declarative Azure resource stacks
#[derive(Parser, Debug, Clone)]
#[command(
    name = "azstack",
    author,
    version,
    about = "Declares and deploys Azure resource stacks",
    long_about = "azstack declares a static website or a consumption function app as a graph of \
                  Azure resources, creates them in dependency order and prints the stack outputs.",
    propagate_version = true
)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv, -vvvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "human", global = true)]
    pub output: OutputFormat,

    /// Configuration file path
    #[arg(short, long, env = "AZSTACK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Print secret outputs in clear text
    #[arg(long, global = true)]
    pub show_secrets: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for machine parsing
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create the stack's resources in Azure
    Up(StackArgs),

    /// Run the stack against the in-memory provider
    Preview(StackArgs),

    /// Print the stack's resource graph in DOT format
    Graph(StackArgs),
}

/// Arguments shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct StackArgs {
    /// Stack to run
    #[arg(value_enum)]
    pub stack: StackKind,

    /// Project name (overrides [project] name)
    #[arg(long)]
    pub project: Option<String>,

    /// Stack identifier (overrides [project] stack)
    #[arg(long = "stack-name")]
    pub stack_name: Option<String>,

    /// Content directory of the static website
    #[arg(long)]
    pub content_dir: Option<PathBuf>,

    /// Function package, a directory or a .zip file
    #[arg(long)]
    pub archive: Option<PathBuf>,

    /// Seed for name suffixes
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(4)
    }

    /// Check if output should be in JSON format
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }

    /// The arguments of whichever subcommand was given.
    pub fn stack_args(&self) -> &StackArgs {
        match &self.command {
            Commands::Up(args) | Commands::Preview(args) | Commands::Graph(args) => args,
        }
    }
}
