//! CLI argument definitions using clap derive

use clap::{ArgAction, ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// repocache - single-flight git snapshot cache
///
/// Produces a metadata-free checkout of a repository at a commit-ish,
/// shared across concurrent requests and protected from purging while in
/// use.
#[derive(Parser, Debug)]
#[command(name = "repocache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "REPOCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check out a repository at a commit-ish and print the snapshot path
    Fetch(FetchArgs),

    /// Release a snapshot returned by fetch so it can be purged
    Unlock(UnlockArgs),

    /// Inspect and maintain the cache pools
    Cache(CacheArgs),

    /// Run the periodic purge until interrupted
    Daemon(DaemonArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("credential").required(true).args(["key", "key_file"])))]
pub struct FetchArgs {
    /// Repository address (git@host:org/repo or https://host/org/repo)
    pub repository: String,

    /// Branch, tag or commit to check out
    pub commitish: String,

    /// Deploy key identifier, fetched into the key cache if missing
    #[arg(short, long)]
    pub key: Option<String>,

    /// Private key file to use as is
    #[arg(long)]
    pub key_file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "plain")]
    pub format: OutputFormat,
}

/// Arguments for the unlock command
#[derive(Parser, Debug)]
pub struct UnlockArgs {
    /// Snapshot path printed by fetch
    pub path: PathBuf,
}

/// Arguments for the daemon command
#[derive(Parser, Debug)]
pub struct DaemonArgs {
    /// Purge interval in milliseconds (default: from config)
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., cache.purge_age_mins)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Cache subcommand
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Create the pool directories
    Init,

    /// Show disk usage per pool
    Usage {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List cache entries with their lock state and idle time
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete unlocked entries idle longer than the purge age
    Purge {
        /// Show what would be removed without deleting
        #[arg(long)]
        dry_run: bool,
    },
}
