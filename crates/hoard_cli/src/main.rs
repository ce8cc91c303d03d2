//! Hoard CLI, the command-line interface to the build cache.
//!
//! Provides `hoard show` to inspect a build record, `hoard diff` to compare
//! two records, `hoard prune` to trim a project's local cache entries, and
//! `hoard check-config` to validate a cache configuration.

#![warn(missing_docs)]

mod check;
mod diff;
mod prune;
mod record;
mod show;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use hoard_config::loader::CONFIG_PATH_PROPERTY;
use hoard_config::{load_session_config, CacheConfig, ConfigError};
use tracing_subscriber::EnvFilter;

/// Hoard, an incremental build-result cache.
#[derive(Parser, Debug)]
#[command(name = "hoard", version, about = "Hoard build cache")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log output (`-v` info, `-vv` debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Path to a cache configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Build root. Defaults to the current directory.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a build record.
    Show(ShowArgs),
    /// Compare a build record with a baseline record.
    Diff(DiffArgs),
    /// Remove old cached builds of a project from the local cache.
    Prune(PruneArgs),
    /// Validate a cache configuration.
    CheckConfig {
        /// Configuration file. Defaults to `--config` or the build root's file.
        path: Option<PathBuf>,
    },
}

/// Arguments for the `hoard show` subcommand.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Record file (`.json` or `.bin`).
    pub record: PathBuf,

    /// Print the whole record as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `hoard diff` subcommand.
#[derive(Parser, Debug)]
pub struct DiffArgs {
    /// Record of the current build.
    pub current: PathBuf,

    /// Record of the baseline build.
    pub baseline: PathBuf,

    /// Directory to write the diff files into.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Arguments for the `hoard prune` subcommand.
#[derive(Parser, Debug)]
pub struct PruneArgs {
    /// Project group.
    #[arg(long)]
    pub group: String,

    /// Project artifact name.
    #[arg(long)]
    pub artifact: String,

    /// Number of most recent builds to keep.
    #[arg(long, default_value_t = 1)]
    pub keep: usize,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Optional path to a configuration file.
    pub config: Option<PathBuf>,
    /// Build root.
    pub root: PathBuf,
}

impl GlobalArgs {
    /// Loads the session configuration for the build root.
    pub fn load_config(&self) -> Result<CacheConfig, ConfigError> {
        let mut properties = BTreeMap::new();
        if let Some(path) = &self.config {
            properties.insert(
                CONFIG_PATH_PROPERTY.to_string(),
                path.display().to_string(),
            );
        }
        load_session_config(&self.root, &properties)
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "hoard=warn",
        1 => "hoard=info",
        _ => "hoard=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    let global = GlobalArgs {
        quiet: cli.quiet,
        config: cli.config,
        root,
    };

    let result = match cli.command {
        Command::Show(ref args) => show::run(args, &global),
        Command::Diff(ref args) => diff::run(args, &global),
        Command::Prune(ref args) => prune::run(args, &global),
        Command::CheckConfig { ref path } => check::run(path.as_deref(), &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
