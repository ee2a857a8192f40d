//! artsync CLI.
//!
//! Two commands:
//! - `run` syncs a local asset folder to the configured wiki page, either
//!   once or continuously via a filesystem watcher
//! - `clear` wipes the remote page and the local state for a fresh start

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use artsync_core::config::Config;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{clear::ClearCommand, run::RunCommand};

#[derive(Debug, Parser)]
#[command(name = "artsync", version, about = "Sync a local art asset folder to a wiki page")]
pub struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a sync round, or keep watching for changes
    Run(RunCommand),
    /// Delete all remote attachments, blank the page, prune old page
    /// versions, and remove the local state documents
    Clear(ClearCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("config error: {}: {}", problem.field, problem.message);
        }
        bail!("invalid configuration ({} problem(s))", problems.len());
    }

    // CLI verbosity overrides the configured level; RUST_LOG overrides both.
    let level = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run(cmd) => cmd.execute(&config).await,
        Commands::Clear(cmd) => cmd.execute(&config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from(["artsync", "run", "--mode", "once", "--dry-run"]).unwrap();
        assert!(matches!(cli.command, Commands::Run(_)));
        let cli = Cli::try_parse_from(["artsync", "-c", "alt.yaml", "clear", "--yes"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("alt.yaml"));
        assert!(matches!(cli.command, Commands::Clear(_)));
    }
}
