//! Per-account sync cursor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// High-water mark of one account's synchronization
///
/// `last_transaction_id` always references a transaction that has already
/// been durably written: the cursor is the last write of a successful pass,
/// so a pass that dies mid-way leaves it untouched and the next pass
/// re-fetches everything the failed one attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub account_id: String,
    pub last_transaction_id: String,
    pub updated_at: DateTime<Utc>,
}

impl SyncCursor {
    pub fn new(account_id: impl Into<String>, last_transaction_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            last_transaction_id: last_transaction_id.into(),
            updated_at: Utc::now(),
        }
    }
}
