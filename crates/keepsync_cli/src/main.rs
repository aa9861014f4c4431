//! keepsync CLI
//!
//! Command-line tools for keepsync record stores.
//!
//! # Commands
//!
//! - `inspect` - Display per-owner record counts and watermarks
//! - `unmerged` - List an owner's records not yet accepted by the server
//! - `watermark` - Print an owner's watermark
//! - `merge` - Import a JSON batch of records as unmerged local entries

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// keepsync record store tools.
#[derive(Parser)]
#[command(name = "keepsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the record store document
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
    /// Display per-owner record counts and watermarks
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List records whose merge stamp is unset
    Unmerged {
        /// Owner identity
        #[arg(short, long)]
        owner: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the highest merge stamp held for an owner
    Watermark {
        /// Owner identity
        #[arg(short, long)]
        owner: String,
    },

    /// Import a JSON array of wire records as unmerged entries
    Merge {
        /// File holding the JSON array
        #[arg(short, long)]
        input: PathBuf,

        /// Re-own every record to this identity
        #[arg(short, long)]
        owner: Option<String>,

        /// Dry run - report outcomes without writing
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Unmerged { owner, format } => {
            let path = cli.path.ok_or("Store path required for unmerged")?;
            commands::unmerged::run(&path, &owner, &format)?;
        }
        Commands::Watermark { owner } => {
            let path = cli.path.ok_or("Store path required for watermark")?;
            commands::watermark::run(&path, &owner)?;
        }
        Commands::Merge {
            input,
            owner,
            dry_run,
        } => {
            let path = cli.path.ok_or("Store path required for merge")?;
            commands::merge::run(&path, &input, owner.as_deref(), dry_run)?;
        }
        Commands::Version => {
            println!("keepsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
