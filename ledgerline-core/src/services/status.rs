//! Status service - account, transaction, and cursor summaries

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::adapters::duckdb::DuckDbStore;

/// Status service for local store summaries
pub struct StatusService {
    store: Arc<DuckDbStore>,
}

impl StatusService {
    pub fn new(store: Arc<DuckDbStore>) -> Self {
        Self { store }
    }

    /// Get overall status summary
    pub fn get_status(&self) -> Result<StatusSummary> {
        let accounts = self.store.get_accounts()?;
        let transaction_count = self.store.get_transaction_count()?;
        let institutions = self.store.get_institutions()?;
        let cursors = self.store.get_cursors()?;
        let date_range = self.store.get_transaction_date_range()?;

        Ok(StatusSummary {
            total_accounts: accounts.len() as i64,
            total_transactions: transaction_count,
            total_cursors: cursors.len() as i64,
            institution_names: institutions.iter().map(|i| i.name.clone()).collect(),
            accounts: accounts
                .into_iter()
                .map(|a| {
                    let cursor = cursors.iter().find(|c| c.account_id == a.id);
                    AccountSummary {
                        id: a.id,
                        name: a.name,
                        institution_name: a.institution.name,
                        last_four: a.last_four,
                        currency: a.currency,
                        cursor: cursor.map(|c| c.last_transaction_id.clone()),
                        cursor_updated_at: cursor.map(|c| c.updated_at.to_rfc3339()),
                    }
                })
                .collect(),
            date_range,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_accounts: i64,
    pub total_transactions: i64,
    pub total_cursors: i64,
    pub institution_names: Vec<String>,
    pub accounts: Vec<AccountSummary>,
    pub date_range: DateRange,
}

#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub id: String,
    pub name: String,
    pub institution_name: String,
    pub last_four: Option<String>,
    pub currency: String,
    /// Last synced transaction id, unset until the first successful pass
    pub cursor: Option<String>,
    pub cursor_updated_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DateRange {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}
