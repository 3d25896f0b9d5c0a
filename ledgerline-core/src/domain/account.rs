//! Account and institution domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The financial institution an account is held at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    pub id: String,
    pub name: String,
}

impl Institution {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A bank account as reported by the upstream API
///
/// The upstream-assigned id is the primary key everywhere: ids are stable
/// across listings and unique across institutions, so no internal id
/// mapping layer exists.
/// Note: account_type is a freeform string; common values are "depository"
/// and "credit" but any string is accepted and passed through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub institution: Institution,
    pub name: String,
    pub account_type: String,
    /// e.g. "checking", "savings", "credit_card"
    pub subtype: Option<String>,
    /// Last four digits of the account number, for display
    pub last_four: Option<String>,
    /// ISO 4217 currency code, normalized to uppercase
    pub currency: String,
    /// "open" or "closed"; absent on older enrollments
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with required fields
    pub fn new(id: impl Into<String>, institution: Institution, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            institution,
            name: name.into(),
            account_type: "depository".to_string(),
            subtype: None,
            last_four: None,
            currency: "USD".to_string(),
            status: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Normalize currency code to uppercase
    pub fn normalize_currency(currency: &str) -> String {
        currency.trim().to_uppercase()
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.id.trim().is_empty() {
            return Err("account id cannot be empty");
        }
        if self.name.trim().is_empty() {
            return Err("account name cannot be empty");
        }
        if self.currency.trim().is_empty() {
            return Err("currency cannot be empty");
        }
        Ok(())
    }
}
