//! Transaction domain model

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A single bank transaction as reported by the upstream API
///
/// `id` is assigned upstream, globally unique, and immutable once posted.
/// Amount and status may still be corrected by a later record bearing the
/// same id, so persistence must upsert by id, never insert-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    pub posted_date: NaiveDate,
    pub description: String,
    /// Signed amount: negative for outflows, positive for inflows
    pub amount: Decimal,
    /// Freeform, e.g. "card_payment", "ach", "interest"
    pub transaction_type: String,
    /// "posted" or "pending"
    pub status: String,
    /// Account balance after this transaction, when the upstream reports it
    pub running_balance: Option<Decimal>,
    /// Opaque enrichment payload passed through unchanged
    pub details: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new transaction with required fields
    pub fn new(
        id: impl Into<String>,
        account_id: impl Into<String>,
        posted_date: NaiveDate,
        description: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            account_id: account_id.into(),
            posted_date,
            description: description.into(),
            amount,
            transaction_type: "card_payment".to_string(),
            status: "posted".to_string(),
            running_balance: None,
            details: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate transaction data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.id.trim().is_empty() {
            return Err("transaction id cannot be empty");
        }
        if self.account_id.trim().is_empty() {
            return Err("account id cannot be empty");
        }
        Ok(())
    }
}
