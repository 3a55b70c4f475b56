//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// lockbom - CycloneDX bills of materials from resolved NuGet manifests
#[derive(Parser)]
#[command(name = "lockbom")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate documents for every module in lockbom.toml
    Generate(GenerateArgs),

    /// Display the resolved dependency tree of a manifest
    Tree(TreeArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Path to lockbom.toml (default: search from the current directory up)
    #[arg(short, long, env = "LOCKBOM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory to write documents to (overrides `[output] directory`)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Ignore ~/.lockbom/config.toml
    #[arg(long)]
    pub no_global: bool,
}

#[derive(Args)]
pub struct TreeArgs {
    /// Path to project.assets.json
    #[arg(default_value = "obj/project.assets.json")]
    pub assets: PathBuf,

    /// Target framework to show (default: first non-runtime target)
    #[arg(short, long)]
    pub framework: Option<String>,

    /// Maximum depth to display
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Show duplicate packages
    #[arg(long)]
    pub duplicates: bool,

    /// Hide packages whose identifier starts with this prefix
    #[arg(long = "exclude-prefix", value_name = "PREFIX")]
    pub exclude_prefixes: Vec<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
