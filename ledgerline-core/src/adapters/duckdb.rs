//! DuckDB store implementation
//!
//! One database file backs both persistence ports: synced records
//! (institutions, accounts, transactions) and per-account sync cursors.
//! All writes are idempotent upserts keyed by the upstream id.

use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use duckdb::{params, Connection};
use rust_decimal::Decimal;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Institution, SyncCursor, Transaction};
use crate::ports::{CursorStore, RecordStore};
use crate::services::{DateRange, MigrationResult, MigrationService};

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Error::Database(e.to_string())
    }
}

/// Maximum number of retries when the database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows wording first, then Unix/macOS
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// DuckDB-backed record and cursor store
pub struct DuckDbStore {
    conn: Mutex<Connection>,
}

impl DuckDbStore {
    /// Open (or create) the store at the given path
    ///
    /// Retries with exponential backoff when the file is locked by another
    /// process, which happens when a second invocation starts while a sync
    /// is still holding the database.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[ledgerline] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::database(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// Attempt to open a database connection (called by new() with retry logic)
    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Disable extension autoloading to avoid macOS code signing issues
        // (cached extensions in ~/.duckdb/extensions may have different Team IDs)
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_with_flags(db_path, config)?;

        // JSON extension is statically linked via the "json" Cargo feature,
        // no LOAD required. ICU is not included - date math happens in Rust.
        Ok(conn)
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn.lock().unwrap();
        let migration_service = MigrationService::new(&conn);
        migration_service
            .run_pending()
            .map_err(|e| Error::database(e.to_string()))
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    // === Account operations ===

    pub fn get_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT account_id, institution_id, institution_name, name, account_type,
                    subtype, last_four, currency, status, created_at, updated_at
             FROM sys_accounts ORDER BY name",
        )?;

        let accounts = stmt
            .query_map([], |row| Ok(row_to_account(row)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(accounts)
    }

    pub fn get_account_by_id(&self, id: &str) -> Result<Option<Account>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT account_id, institution_id, institution_name, name, account_type,
                    subtype, last_four, currency, status, created_at, updated_at
             FROM sys_accounts WHERE account_id = ?",
        )?;

        let account = stmt.query_row([id], |row| Ok(row_to_account(row))).ok();

        Ok(account)
    }

    // === Transaction operations ===

    pub fn get_transactions_by_account(&self, account_id: &str) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock().unwrap();
        // Cast DATE and DECIMAL columns to VARCHAR so they round-trip through
        // strings with full precision
        let mut stmt = conn.prepare(
            "SELECT transaction_id, account_id, posted_date::VARCHAR, description,
                    amount::VARCHAR, transaction_type, status, running_balance::VARCHAR,
                    details, created_at, updated_at
             FROM sys_transactions WHERE account_id = ?
             ORDER BY posted_date DESC, transaction_id DESC",
        )?;

        let transactions = stmt
            .query_map([account_id], |row| Ok(row_to_transaction(row)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(transactions)
    }

    pub fn get_transaction_by_id(&self, id: &str) -> Result<Option<Transaction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT transaction_id, account_id, posted_date::VARCHAR, description,
                    amount::VARCHAR, transaction_type, status, running_balance::VARCHAR,
                    details, created_at, updated_at
             FROM sys_transactions WHERE transaction_id = ?",
        )?;

        let tx = stmt.query_row([id], |row| Ok(row_to_transaction(row))).ok();

        Ok(tx)
    }

    pub fn get_transaction_count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM sys_transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Earliest and latest posted dates across all transactions
    pub fn get_transaction_date_range(&self) -> Result<DateRange> {
        let conn = self.conn.lock().unwrap();
        let (earliest, latest) = conn.query_row(
            "SELECT MIN(posted_date)::VARCHAR, MAX(posted_date)::VARCHAR FROM sys_transactions",
            [],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                ))
            },
        )?;
        Ok(DateRange { earliest, latest })
    }

    // === Institution operations ===

    pub fn get_institutions(&self) -> Result<Vec<Institution>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT institution_id, name FROM sys_institutions ORDER BY name")?;

        let institutions = stmt
            .query_map([], |row| {
                Ok(Institution {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(institutions)
    }

    // === Cursor operations ===

    pub fn get_cursors(&self) -> Result<Vec<SyncCursor>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT account_id, last_transaction_id, updated_at
             FROM sys_sync_cursors ORDER BY account_id",
        )?;

        let cursors = stmt
            .query_map([], |row| {
                let updated_str: String = row.get(2)?;
                Ok(SyncCursor {
                    account_id: row.get(0)?,
                    last_transaction_id: row.get(1)?,
                    updated_at: parse_timestamp(&updated_str),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(cursors)
    }
}

impl RecordStore for DuckDbStore {
    fn upsert_institution(&self, institution: &Institution) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO sys_institutions (institution_id, name, created_at, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (institution_id) DO UPDATE SET
                name = EXCLUDED.name,
                updated_at = EXCLUDED.updated_at",
            params![institution.id, institution.name, now, now],
        )?;

        Ok(())
    }

    fn upsert_account(&self, account: &Account) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        // Required fields take the incoming value; optional descriptive
        // fields keep the last known value when the upstream omits them.
        // created_at survives conflicts, updated_at always refreshes.
        conn.execute(
            "INSERT INTO sys_accounts (account_id, institution_id, institution_name, name,
                                       account_type, subtype, last_four, currency, status,
                                       created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (account_id) DO UPDATE SET
                institution_id = EXCLUDED.institution_id,
                institution_name = EXCLUDED.institution_name,
                name = EXCLUDED.name,
                account_type = EXCLUDED.account_type,
                subtype = COALESCE(EXCLUDED.subtype, sys_accounts.subtype),
                last_four = COALESCE(EXCLUDED.last_four, sys_accounts.last_four),
                currency = EXCLUDED.currency,
                status = COALESCE(EXCLUDED.status, sys_accounts.status),
                updated_at = EXCLUDED.updated_at",
            params![
                account.id,
                account.institution.id,
                account.institution.name,
                account.name,
                account.account_type,
                account.subtype,
                account.last_four,
                account.currency,
                account.status,
                account.created_at.to_rfc3339(),
                account.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    fn upsert_transaction(&self, tx: &Transaction) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let details = tx.details.as_ref().map(|v| v.to_string());

        // Latest record wins: a re-delivered id overwrites amount, status,
        // running balance and the rest of its mutable fields in place.
        conn.execute(
            "INSERT INTO sys_transactions (transaction_id, account_id, posted_date, description,
                                           amount, transaction_type, status, running_balance,
                                           details, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (transaction_id) DO UPDATE SET
                account_id = EXCLUDED.account_id,
                posted_date = EXCLUDED.posted_date,
                description = EXCLUDED.description,
                amount = EXCLUDED.amount,
                transaction_type = EXCLUDED.transaction_type,
                status = EXCLUDED.status,
                running_balance = EXCLUDED.running_balance,
                details = EXCLUDED.details,
                updated_at = EXCLUDED.updated_at",
            params![
                tx.id,
                tx.account_id,
                tx.posted_date.to_string(),
                tx.description,
                tx.amount.to_string(),
                tx.transaction_type,
                tx.status,
                tx.running_balance.map(|d| d.to_string()),
                details,
                tx.created_at.to_rfc3339(),
                tx.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }
}

impl CursorStore for DuckDbStore {
    fn get_cursor(&self, account_id: &str) -> Result<Option<SyncCursor>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT account_id, last_transaction_id, updated_at
             FROM sys_sync_cursors WHERE account_id = ?",
        )?;

        // Absent row = never synced. Any other read error must surface:
        // treating it as "no cursor" would degrade a delta pass into an
        // unconstrained fetch.
        match stmt.query_row([account_id], |row| {
            let updated_str: String = row.get(2)?;
            Ok(SyncCursor {
                account_id: row.get(0)?,
                last_transaction_id: row.get(1)?,
                updated_at: parse_timestamp(&updated_str),
            })
        }) {
            Ok(cursor) => Ok(Some(cursor)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_cursor(
        &self,
        account_id: &str,
        last_transaction_id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO sys_sync_cursors (account_id, last_transaction_id, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT (account_id) DO UPDATE SET
                last_transaction_id = EXCLUDED.last_transaction_id,
                updated_at = EXCLUDED.updated_at",
            params![account_id, last_transaction_id, updated_at.to_rfc3339()],
        )?;

        Ok(())
    }
}

// Row mappers and parse helpers

fn row_to_account(row: &duckdb::Row) -> Account {
    // Column indices from SELECT:
    // 0: account_id, 1: institution_id, 2: institution_name, 3: name,
    // 4: account_type, 5: subtype, 6: last_four, 7: currency, 8: status,
    // 9: created_at, 10: updated_at
    let created_str: String = row.get(9).unwrap_or_default();
    let updated_str: String = row.get(10).unwrap_or_default();

    Account {
        id: row.get(0).unwrap_or_default(),
        institution: Institution {
            id: row.get(1).unwrap_or_default(),
            name: row.get(2).unwrap_or_default(),
        },
        name: row.get(3).unwrap_or_default(),
        account_type: row.get(4).unwrap_or_default(),
        subtype: row.get::<_, Option<String>>(5).ok().flatten(),
        last_four: row.get::<_, Option<String>>(6).ok().flatten(),
        currency: row.get(7).unwrap_or_else(|_| "USD".to_string()),
        status: row.get::<_, Option<String>>(8).ok().flatten(),
        created_at: parse_timestamp(&created_str),
        updated_at: parse_timestamp(&updated_str),
    }
}

fn row_to_transaction(row: &duckdb::Row) -> Transaction {
    // Column indices from SELECT:
    // 0: transaction_id, 1: account_id, 2: posted_date, 3: description,
    // 4: amount, 5: transaction_type, 6: status, 7: running_balance,
    // 8: details, 9: created_at, 10: updated_at
    let posted_str: String = row.get(2).unwrap_or_default();
    let amount_str: String = row.get(4).unwrap_or_default();
    let balance_str: Option<String> = row.get::<_, Option<String>>(7).ok().flatten();
    let details_json: Option<String> = row.get::<_, Option<String>>(8).ok().flatten();
    let created_str: String = row.get(9).unwrap_or_default();
    let updated_str: String = row.get(10).unwrap_or_default();

    Transaction {
        id: row.get(0).unwrap_or_default(),
        account_id: row.get(1).unwrap_or_default(),
        posted_date: parse_date(&posted_str),
        description: row.get(3).unwrap_or_default(),
        amount: parse_decimal(&amount_str),
        transaction_type: row.get(5).unwrap_or_default(),
        status: row.get(6).unwrap_or_default(),
        running_balance: balance_str.map(|s| parse_decimal(&s)),
        details: details_json.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: parse_timestamp(&created_str),
        updated_at: parse_timestamp(&updated_str),
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_else(|_| Utc::now().date_naive())
}

fn parse_decimal(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let date = parse_date("2024-03-03");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
    }

    #[test]
    fn test_parse_decimal_preserves_cents() {
        assert_eq!(parse_decimal("-84.88"), Decimal::new(-8488, 2));
        assert_eq!(parse_decimal("1200.00"), Decimal::new(120000, 2));
    }

    #[test]
    fn test_parse_timestamp_round_trip() {
        let now = Utc::now();
        let parsed = parse_timestamp(&now.to_rfc3339());
        assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn test_retryable_error_detection() {
        assert!(is_retryable_error("IO Error: database is locked"));
        assert!(is_retryable_error(
            "The process cannot access the file because it is being used by another process"
        ));
        assert!(!is_retryable_error("Catalog Error: table does not exist"));
    }

    #[test]
    fn test_get_cursor_propagates_read_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = DuckDbStore::new(&dir.path().join("cursors.duckdb")).unwrap();
        store.ensure_schema().unwrap();

        // No row yet: the normal "never synced" answer
        assert!(store.get_cursor("acc_new").unwrap().is_none());

        // A corrupt row (NULL watermark) must surface as an error; reading
        // it as "never synced" would turn the next delta pass into an
        // unconstrained fetch
        store
            .conn
            .lock()
            .unwrap()
            .execute_batch(
                "DROP TABLE sys_sync_cursors;
                 CREATE VIEW sys_sync_cursors AS
                     SELECT 'acc_new'::VARCHAR AS account_id,
                            NULL::VARCHAR AS last_transaction_id,
                            '2024-01-01T00:00:00+00:00'::VARCHAR AS updated_at;",
            )
            .unwrap();

        assert!(store.get_cursor("acc_new").is_err());
    }
}
