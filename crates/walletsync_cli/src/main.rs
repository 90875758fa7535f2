//! WalletSync CLI
//!
//! Command-line tools for replaying sync runs against fixtures.
//!
//! # Commands
//!
//! - `run` - Sync a fixture world and report per-entity results
//! - `tables` - List entities in sync order with their dependencies
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// WalletSync command-line tools.
#[derive(Parser)]
#[command(name = "walletsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync a fixture world and report the outcome
    Run {
        /// Fixture file describing the local and remote worlds
        #[arg(short, long)]
        fixture: PathBuf,

        /// User to sync as (defaults to the fixture's user)
        #[arg(short, long)]
        user: Option<String>,

        /// Sync only this remote table
        #[arg(short, long)]
        table: Option<String>,

        /// Conflict policy (local, server, lww, merge)
        #[arg(short, long)]
        policy: Option<String>,

        /// Simulate an offline device
        #[arg(long)]
        offline: bool,

        /// Number of consecutive sync rounds
        #[arg(short, long, default_value = "1")]
        rounds: u32,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,

        /// Write the resulting world to this fixture file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List entities in sync order
    Tables {
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            fixture,
            user,
            table,
            policy,
            offline,
            rounds,
            format,
            output,
        } => {
            let options = commands::run::RunOptions {
                user,
                table,
                policy: policy.as_deref().map(str::parse).transpose()?,
                offline,
                rounds,
            };
            let outcome = commands::run::run(&fixture, &options).await?;
            commands::run::print(&outcome, &format)?;
            if let Some(output) = output {
                outcome.world.save(&output)?;
            }
            if !outcome.is_success() {
                return Err("one or more entities failed to sync".into());
            }
        }
        Commands::Tables { format } => {
            commands::tables::run(&format)?;
        }
        Commands::Version => {
            println!("WalletSync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("WalletSync Engine v{}", walletsync_engine::VERSION);
        }
    }

    Ok(())
}
