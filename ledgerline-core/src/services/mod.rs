//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod logging;
pub mod migration;
mod status;
mod sync;

pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use status::{AccountSummary, DateRange, StatusService, StatusSummary};
pub use sync::{AccountSyncError, SyncService, SyncSummary};
