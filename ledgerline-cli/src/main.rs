//! Ledgerline CLI - mirror your bank data into DuckDB

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{backfill, logs, setup, status, sync};

/// Ledgerline - incremental bank data sync in your terminal
#[derive(Parser)]
#[command(name = "lgl", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store and verify the API access token
    Setup {
        /// Teller access token
        #[arg(long)]
        token: Option<String>,
    },

    /// Pull transactions newer than each account's cursor
    Sync {
        /// Access token override for this run
        #[arg(long)]
        token: Option<String>,
        /// Maximum transactions fetched per account
        #[arg(long)]
        page_size: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-fetch every account's history from the top
    Backfill {
        /// Access token override for this run
        #[arg(long)]
        token: Option<String>,
        /// Maximum transactions fetched per account
        #[arg(long)]
        page_size: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show store summary and per-account cursors
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    output::init_colors();

    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Setup { token } => setup::run(token),
        Commands::Sync {
            token,
            page_size,
            json,
        } => sync::run(token, page_size, json),
        Commands::Backfill {
            token,
            page_size,
            json,
        } => backfill::run(token, page_size, json),
        Commands::Status { json } => status::run(json),
        Commands::Logs { command } => logs::run(command),
    }
}
