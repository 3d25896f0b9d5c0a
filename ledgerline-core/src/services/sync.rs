//! Sync service - incremental synchronization of accounts and transactions

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::Account;
use crate::ports::{Credential, CursorStore, RecordStore, TransactionQuery, TransactionSource};

/// Which bound the per-account fetch uses
#[derive(Debug, Clone, Copy)]
enum SyncMode {
    /// Ignore stored cursors; fetch the most recent page
    Full,
    /// Use the stored cursor as an exclusive lower bound
    Delta,
}

/// Synchronization engine
///
/// Pulls accounts and transactions from a `TransactionSource` and lands
/// them in the record and cursor stores. Each account is reconciled as an
/// independent pass: a failing account is reported in the summary and does
/// not disturb the others. The engine keeps no state of its own between
/// invocations; everything it needs lives in the stores.
pub struct SyncService {
    source: Arc<dyn TransactionSource>,
    records: Arc<dyn RecordStore>,
    cursors: Arc<dyn CursorStore>,
}

impl SyncService {
    pub fn new(
        source: Arc<dyn TransactionSource>,
        records: Arc<dyn RecordStore>,
        cursors: Arc<dyn CursorStore>,
    ) -> Self {
        Self {
            source,
            records,
            cursors,
        }
    }

    /// Backfill: sync every account from scratch, ignoring stored cursors.
    ///
    /// Fetches up to `page_size` most-recent transactions per account and
    /// moves each cursor to the newest id fetched. Already-present rows are
    /// overwritten in place, never duplicated.
    pub fn run_full_sync(&self, credential: &Credential, page_size: usize) -> Result<SyncSummary> {
        self.run(credential, page_size, SyncMode::Full)
    }

    /// Delta sync: fetch only transactions newer than each account's cursor.
    ///
    /// An account without a cursor behaves like a backfill for that account.
    /// At most `page_size` transactions are fetched per account per run; if
    /// more are pending, the next run continues from where this one's cursor
    /// landed.
    pub fn run_delta_sync(&self, credential: &Credential, page_size: usize) -> Result<SyncSummary> {
        self.run(credential, page_size, SyncMode::Delta)
    }

    fn run(
        &self,
        credential: &Credential,
        page_size: usize,
        mode: SyncMode,
    ) -> Result<SyncSummary> {
        // A credential the upstream rejects fails the whole run here,
        // before any account work has started
        let accounts = self.source.list_accounts(credential)?;

        let mut accounts_synced = 0i64;
        let mut transactions_synced = 0i64;
        let mut errors = Vec::new();

        for account in &accounts {
            match self.sync_account(credential, account, page_size, mode) {
                Ok(count) => {
                    accounts_synced += 1;
                    transactions_synced += count;
                }
                Err(e) => {
                    errors.push(AccountSyncError {
                        account_id: account.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(SyncSummary {
            ok: true,
            accounts: accounts_synced,
            transactions: transactions_synced,
            errors,
        })
    }

    /// Reconcile one account.
    ///
    /// Upserts the institution (best-effort) and the account, fetches one
    /// bounded page of transactions, writes them oldest-first, and finally
    /// advances the cursor to the newest id of the fetch. The cursor write
    /// is strictly last: if any transaction upsert fails, the cursor stays
    /// where it was and the next pass re-fetches the whole page. Re-fetched
    /// rows upsert idempotently, so the retry is safe.
    fn sync_account(
        &self,
        credential: &Credential,
        account: &Account,
        page_size: usize,
        mode: SyncMode,
    ) -> Result<i64> {
        // Institution metadata is display-only; not worth failing the
        // account's pass over, but worth a trace on stderr
        if let Err(e) = self.records.upsert_institution(&account.institution) {
            eprintln!(
                "[ledgerline] Institution upsert failed for {}: {}",
                account.institution.id, e
            );
        }
        self.records.upsert_account(account)?;

        let from_id = match mode {
            SyncMode::Delta => self
                .cursors
                .get_cursor(&account.id)?
                .map(|c| c.last_transaction_id),
            SyncMode::Full => None,
        };

        let query = TransactionQuery {
            count: page_size,
            from_id,
        };
        let fetched = self
            .source
            .list_transactions(credential, &account.id, &query)?;

        // The fetch is newest-first, so its head is the cursor target.
        // Captured before the reversal below.
        let newest = fetched.first().map(|t| t.id.clone());

        let mut transactions = fetched;
        transactions.reverse();

        // Oldest-first write order is a contract: anything downstream that
        // watches inserts (running balances, event feeds) sees history in
        // chronological order
        let count = transactions.len() as i64;
        for tx in &transactions {
            self.records.upsert_transaction(tx)?;
        }

        if let Some(newest_id) = newest {
            self.cursors
                .set_cursor(&account.id, &newest_id, Utc::now())?;
        }

        Ok(count)
    }
}

/// Aggregate outcome of one sync run
#[derive(Debug, Serialize)]
pub struct SyncSummary {
    /// True when the run itself executed; per-account failures live in
    /// `errors`, they do not flip this flag
    pub ok: bool,
    /// Accounts fully reconciled this run
    pub accounts: i64,
    /// Transactions written this run
    pub transactions: i64,
    pub errors: Vec<AccountSyncError>,
}

impl SyncSummary {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// One failed account within an otherwise-continuing run
#[derive(Debug, Serialize)]
pub struct AccountSyncError {
    pub account_id: String,
    pub reason: String,
}
