//! Cursor store port

use chrono::{DateTime, Utc};

use crate::domain::result::Result;
use crate::domain::SyncCursor;

/// Per-account cursor persistence
///
/// The engine reads the cursor at the start of a delta pass and overwrites
/// it as the final write of a successful pass. A stored cursor must never
/// reference a transaction that has not been upserted.
pub trait CursorStore: Send + Sync {
    /// Read the cursor for an account; `None` before its first successful pass
    fn get_cursor(&self, account_id: &str) -> Result<Option<SyncCursor>>;

    /// Create or overwrite the cursor for an account
    fn set_cursor(
        &self,
        account_id: &str,
        last_transaction_id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;
}
