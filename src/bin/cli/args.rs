//! CLI Argument Structures
//!
//! Command and argument definitions for the selefra-modules binary.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Module declaration graph resolver for selefra policy workspaces
#[derive(Parser)]
#[command(name = "selefra-modules")]
#[command(version = VERSION)]
#[command(about = "Resolve selefra module declarations into a flat module list")]
#[command(long_about = "
Scan a policy workspace for `modules:` declarations, follow local, registry
and organization references, and print the flattened module list consumed
by the rule loader.

Common Usage:

  # Resolve the current directory and print the module list
  selefra-modules resolve

  # Resolve another workspace and write the result to a file
  selefra-modules resolve --workspace ./policies --out modules.yaml

  # Show which documents were discovered and which are inlined
  selefra-modules documents --workspace ./policies
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve and flatten the workspace module declarations
    Resolve(ResolveArgs),

    /// List discovered module documents
    Documents(WorkspaceArgs),

    /// Print default configuration in YAML format
    #[command(name = "print-default-config")]
    PrintDefaultConfig,

    /// Initialize a configuration file with defaults
    #[command(name = "init-config")]
    InitConfig(InitConfigArgs),

    /// Validate a resolver configuration file
    #[command(name = "validate-config")]
    ValidateConfig(ValidateConfigArgs),
}

/// Options locating the workspace and its configuration
#[derive(Args, Clone)]
pub struct WorkspaceArgs {
    /// Workspace root to scan (overrides the configuration file)
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Login token for organization packages
    #[arg(long, env = "SELEFRA_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Write the module list to a file instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct InitConfigArgs {
    /// Output configuration file name
    #[arg(short, long, default_value = ".selefra-modules.yml")]
    pub output: PathBuf,

    /// Overwrite existing configuration file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ValidateConfigArgs {
    /// Path to configuration file to validate
    #[arg(short, long, required = true)]
    pub config: PathBuf,
}
