//! CLI command implementations

pub mod backfill;
pub mod logs;
pub mod setup;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use ledgerline_core::{EntryPoint, LedgerlineContext, LogEvent, LoggingService};

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let ledgerline_dir = get_ledgerline_dir();
    // Ensure directory exists
    std::fs::create_dir_all(&ledgerline_dir).ok()?;
    LoggingService::new(&ledgerline_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Record a command invocation, ignoring any errors
pub fn log_command(logger: &Option<LoggingService>, command: &str) {
    if let Some(l) = logger {
        let _ = l.log_command(command);
    }
}

/// Get the ledgerline directory from environment or default
pub fn get_ledgerline_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LEDGERLINE_DIR") {
        PathBuf::from(dir)
    } else {
        dirs::home_dir()
            .expect("Could not find home directory")
            .join(".ledgerline")
    }
}

/// Get or create ledgerline context
pub fn get_context() -> Result<LedgerlineContext> {
    let ledgerline_dir = get_ledgerline_dir();

    // Create directory if it doesn't exist
    std::fs::create_dir_all(&ledgerline_dir)
        .with_context(|| format!("Failed to create ledgerline directory: {:?}", ledgerline_dir))?;

    LedgerlineContext::new(&ledgerline_dir).context("Failed to initialize ledgerline context")
}
