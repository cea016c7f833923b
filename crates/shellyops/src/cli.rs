//! Clap derive structures for the `shellyops` CLI.
//!
//! This file is also compiled by `build.rs` to render man pages, so it may
//! only depend on `clap` and `clap_complete`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// shellyops -- keep Shelly devices in sync with a git repository
#[derive(Debug, Parser)]
#[command(
    name = "shellyops",
    version,
    about = "Keep a fleet of Shelly devices in sync with a git repository",
    long_about = "Snapshot the configuration, scripts, schedules, webhooks and KVS data of\n\
        every registered Shelly device into a repository (pull), and reconcile\n\
        devices back to the committed state with templated values (push).",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Repository root holding manifest.yaml and the device folders
    #[arg(long, short = 'C', env = "SHELLYOPS_REPO", global = true)]
    pub repo: Option<PathBuf>,

    /// Output format
    #[arg(long, short, env = "SHELLYOPS_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Per-request device timeout in seconds
    #[arg(long, env = "SHELLYOPS_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Snapshot every registered device into the repository
    Pull,

    /// Reconcile devices to the state committed in the repository
    Push(PushArgs),

    /// Manage the device registry
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Inspect CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Push ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PushArgs {
    /// Count the changes without touching any device
    #[arg(long)]
    pub dry_run: bool,

    /// Values file for template rendering (default: <repo>/values.yaml)
    #[arg(long, value_name = "PATH")]
    pub values: Option<PathBuf>,

    /// Only push these devices, by id or name. Each one must be registered,
    /// otherwise nothing is pushed
    #[arg(long, value_delimiter = ',', value_name = "ID_OR_NAME")]
    pub devices: Vec<String>,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List registered devices
    #[command(alias = "ls")]
    List,

    /// Register the device at HOST
    Add {
        /// IP address or hostname
        host: String,
    },

    /// Remove a device from the registry (its folder is kept)
    #[command(alias = "rm")]
    Remove {
        /// Device id as shown by `devices list`
        device_id: String,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
