//! Record store port
//!
//! Persistence contract for synced records. Every write is an idempotent
//! upsert keyed by the upstream id: re-delivery of an already-seen record
//! overwrites its mutable fields instead of duplicating the row, which is
//! what makes re-running a partially failed pass safe.

use crate::domain::result::Result;
use crate::domain::{Account, Institution, Transaction};

pub trait RecordStore: Send + Sync {
    /// Insert or update an institution by id
    fn upsert_institution(&self, institution: &Institution) -> Result<()>;

    /// Insert or update an account by id
    fn upsert_account(&self, account: &Account) -> Result<()>;

    /// Insert or update a transaction by id, overwriting mutable fields
    /// (amount, status, running balance) on conflict
    fn upsert_transaction(&self, transaction: &Transaction) -> Result<()>;
}
