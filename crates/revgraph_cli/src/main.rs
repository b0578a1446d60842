//! revgraph CLI - Browse git history as it loads.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "revgraph")]
#[command(about = "Incremental git history graph browser", long_about = None)]
#[command(version)]
struct Cli {
    /// Run as if started in this directory
    #[arg(short = 'C', long, global = true, default_value = ".")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the commit graph of a revision range
    Log {
        /// Revisions and path filters, passed to git log as is
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        range: Vec<String>,
        /// Stop loading after this many commits
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Don't show uncommitted changes as a separate row
        #[arg(long)]
        no_working_dir: bool,
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List the commits touching a file, following renames
    FileHistory {
        /// File path relative to the repository root
        path: String,
        /// Revision to start from
        #[arg(long)]
        from: Option<String>,
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the nearest tags before and after a commit
    NearTags {
        /// Revision to inspect
        #[arg(default_value = "HEAD")]
        rev: String,
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List branches, remote branches and tags
    Refs {
        /// Only list names whose target is part of the loaded history
        #[arg(long)]
        loaded: bool,
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the children of a commit and the branches containing it
    Children {
        /// Revision to inspect
        rev: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Log {
            range,
            limit,
            no_working_dir,
            format,
        } => commands::log::run(&cli.repo, &range, limit, no_working_dir, &format),
        Commands::FileHistory { path, from, format } => {
            commands::file_history::run(&cli.repo, &path, from.as_deref(), &format)
        }
        Commands::NearTags { rev, format } => commands::near_tags::run(&cli.repo, &rev, &format),
        Commands::Refs { loaded, format } => commands::refs::run(&cli.repo, loaded, &format),
        Commands::Children { rev } => commands::children::run(&cli.repo, &rev),
    }
}
