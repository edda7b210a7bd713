//! LowlaDB CLI
//!
//! Command-line tools for inspecting and syncing a LowlaDB store directory.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics and sync metadata
//! - `pending` - List local edits waiting to be pushed
//! - `dump` - Print the documents of one namespace
//! - `sync` - Run one sync cycle against an adapter
//! - `compact` - Rewrite the log as a single snapshot

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// LowlaDB command-line store tools.
#[derive(Parser)]
#[command(name = "lowla")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics and sync metadata
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List local edits waiting to be pushed
    Pending {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the documents of one namespace as wire JSON, one per line
    Dump {
        /// Namespace, `<db>.<collection>`
        #[arg(short, long)]
        ns: String,

        /// Maximum number of documents
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Run one sync cycle against an adapter
    Sync {
        /// Base URL of the adapter
        #[arg(short, long)]
        url: String,

        /// Documents per push or pull request
        #[arg(short, long, default_value_t = lowla_sync::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Rewrite the log as a single snapshot
    Compact {
        /// Report the current size without compacting
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Pending { format } => {
            let path = cli.path.ok_or("Store path required for pending")?;
            commands::pending::run(&path, &format)?;
        }
        Commands::Dump { ns, limit } => {
            let path = cli.path.ok_or("Store path required for dump")?;
            commands::dump::run(&path, &ns, limit)?;
        }
        Commands::Sync { url, chunk_size } => {
            let path = cli.path.ok_or("Store path required for sync")?;
            commands::sync::run(&path, &url, chunk_size)?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.ok_or("Store path required for compact")?;
            commands::compact::run(&path, dry_run)?;
        }
        Commands::Version => {
            println!("LowlaDB CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
