//! Ledgerline Core - incremental bank-data synchronization
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, Transaction, SyncCursor)
//! - **ports**: Trait definitions for external dependencies (TransactionSource, RecordStore, CursorStore)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB, Teller)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;
pub mod log_migrations;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbStore;
use adapters::teller::TellerSource;
use config::Config;
use services::{StatusService, SyncService};

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{Account, Institution, SyncCursor, Transaction};
pub use ports::Credential;
pub use services::{EntryPoint, LogEntry, LogEvent, LoggingService};

/// Main context for Ledgerline operations
///
/// This is the primary entry point for all business logic. It holds
/// the database connection, configuration, and the services.
pub struct LedgerlineContext {
    pub config: Config,
    pub store: Arc<DuckDbStore>,
    pub sync_service: SyncService,
    pub status_service: StatusService,
}

impl LedgerlineContext {
    /// Create a new Ledgerline context
    pub fn new(ledgerline_dir: &Path) -> Result<Self> {
        let config = Config::load(ledgerline_dir)?;

        let db_path = ledgerline_dir.join("ledgerline.duckdb");
        let store = Arc::new(DuckDbStore::new(&db_path)?);

        // Initialize schema
        store.ensure_schema()?;

        // Create services
        let sync_service =
            SyncService::new(Arc::new(TellerSource::new()), store.clone(), store.clone());
        let status_service = StatusService::new(Arc::clone(&store));

        Ok(Self {
            config,
            store,
            sync_service,
            status_service,
        })
    }

    /// Resolve the API credential: explicit flag first, then environment,
    /// then settings.json. Missing everywhere is a credential error.
    pub fn credential(&self, flag_token: Option<&str>) -> domain::result::Result<Credential> {
        let token = flag_token
            .map(|t| t.to_string())
            .or_else(|| self.config.access_token.clone())
            .ok_or_else(|| {
                Error::credential(
                    "No access token configured. Run 'lgl setup' or set LEDGERLINE_ACCESS_TOKEN.",
                )
            })?;

        let mut credential = Credential::new(token);
        if let Some(base_url) = &self.config.base_url {
            credential = credential.with_base_url(base_url.clone());
        }
        Ok(credential)
    }
}
