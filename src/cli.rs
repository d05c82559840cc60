use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pveforge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Plan, preview and apply VM provisioning on a Proxmox VE host", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to config.toml (defaults to ~/.config/pveforge/config.toml)
    #[arg(long, global = true, env = "PVEFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the steps of a plan file, optionally exporting a bash script
    Plan(PlanArgs),

    /// Run a plan file (preview unless --execute)
    Apply(ApplyArgs),

    /// Capture the current configuration of a VM
    Snapshot(SnapshotArgs),

    /// Export transcripts and snapshots as a support bundle
    Bundle,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Plan
// ============================================================================

#[derive(Parser)]
pub struct PlanArgs {
    /// Plan file (TOML)
    pub plan: PathBuf,

    /// Write the plan as an executable bash script
    #[arg(long, value_name = "FILE")]
    pub script_out: Option<PathBuf>,
}

// ============================================================================
// Apply
// ============================================================================

#[derive(Parser)]
pub struct ApplyArgs {
    /// Plan file (TOML)
    pub plan: PathBuf,

    /// Actually run the commands (default is a preview)
    #[arg(long)]
    pub execute: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Per-command timeout in seconds (overrides config)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Snapshot
// ============================================================================

#[derive(Parser)]
pub struct SnapshotArgs {
    /// VM identifier
    pub vmid: u32,
}
