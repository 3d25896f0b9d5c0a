//! Teller API client
//!
//! Handles communication with the Teller API for account and transaction
//! sync. Teller exposes one enrollment per access token; all accounts
//! visible to the token belong to that enrollment.
//!
//! API Documentation: https://teller.io/docs

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use url::Url;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Institution, Transaction};
use crate::ports::{Credential, TransactionQuery, TransactionSource};

// =============================================================================
// API Response Models (matching Teller API spec)
// =============================================================================

/// Institution block nested in account payloads
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TellerInstitution {
    pub id: String,
    pub name: String,
}

/// Teller account from API
///
/// Teller returns accounts as a bare JSON array, no wrapper object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TellerAccount {
    pub id: String,
    pub institution: TellerInstitution,
    pub name: String,
    /// API field is `type`; "depository" or "credit"
    #[serde(rename = "type", default)]
    pub account_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub last_four: Option<String>,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Teller transaction from API
///
/// Returned newest-first as a bare JSON array. Amounts arrive as decimal
/// strings ("-84.88"); we accept numbers too.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TellerTransaction {
    pub id: String,
    #[serde(default)]
    pub account_id: String,
    /// ISO date YYYY-MM-DD
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "deserialize_amount")]
    pub amount: Decimal,
    /// API field is `type`; "card_payment", "ach", "interest", ...
    #[serde(rename = "type", default)]
    pub transaction_type: String,
    /// "posted" or "pending"
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    pub running_balance: Option<Decimal>,
    /// Enrichment payload (category, counterparty, ...) passed through raw
    #[serde(default)]
    pub details: Option<JsonValue>,
}

/// Deserialize amount that can be number or string
fn deserialize_amount<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: JsonValue = Deserialize::deserialize(deserializer)?;
    match value {
        JsonValue::Number(n) => {
            let s = n.to_string();
            s.parse::<Decimal>()
                .map_err(|e| D::Error::custom(format!("invalid decimal: {}", e)))
        }
        JsonValue::String(s) => s
            .parse::<Decimal>()
            .map_err(|e| D::Error::custom(format!("invalid decimal: {}", e))),
        _ => Err(D::Error::custom("expected number or string for amount")),
    }
}

/// Deserialize optional amount that can be number, string, or null
fn deserialize_optional_amount<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<JsonValue> = Option::deserialize(deserializer)?;
    match value {
        Some(JsonValue::Number(n)) => {
            let s = n.to_string();
            s.parse::<Decimal>()
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid decimal: {}", e)))
        }
        Some(JsonValue::String(s)) => s
            .parse::<Decimal>()
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid decimal: {}", e))),
        Some(JsonValue::Null) | None => Ok(None),
        _ => Err(D::Error::custom("expected number or string for amount")),
    }
}

// =============================================================================
// Teller HTTP Client
// =============================================================================

/// Default production API URL
const TELLER_PRODUCTION_URL: &str = "https://api.teller.io";

/// Environment variable to override the Teller API base URL.
/// Set this to use a sandbox environment or a local mock for testing.
pub const TELLER_BASE_URL_ENV: &str = "TELLER_BASE_URL";

/// Get the Teller base URL, checking environment variable first
pub fn get_base_url() -> String {
    std::env::var(TELLER_BASE_URL_ENV).unwrap_or_else(|_| TELLER_PRODUCTION_URL.to_string())
}

fn is_loopback_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]")
}

/// Teller API client
///
/// Authenticates with HTTP Basic auth: the access token is the username,
/// the password is empty.
#[derive(Debug)]
pub struct TellerClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl TellerClient {
    /// Create a new Teller client with the given access token.
    ///
    /// Uses the `TELLER_BASE_URL` environment variable if set,
    /// otherwise defaults to the production API.
    pub fn new(access_token: &str) -> Result<Self> {
        Self::new_with_base_url(access_token, &get_base_url())
    }

    /// Create a new Teller client with a custom base URL.
    ///
    /// Plain HTTP is rejected unless the host is a loopback address, so
    /// tokens never travel unencrypted outside the local machine.
    pub fn new_with_base_url(access_token: &str, base_url: &str) -> Result<Self> {
        if access_token.trim().is_empty() {
            return Err(Error::credential("Teller access token cannot be empty"));
        }

        let parsed = Url::parse(base_url)
            .map_err(|_| Error::validation(format!("Invalid Teller base URL: {}", base_url)))?;

        match parsed.scheme() {
            "https" => {}
            "http" => {
                let host = parsed.host_str().unwrap_or("");
                if !is_loopback_host(host) {
                    return Err(Error::validation(
                        "Teller base URL must use HTTPS (plain HTTP is only allowed for loopback hosts)",
                    ));
                }
            }
            other => {
                return Err(Error::validation(format!(
                    "Unsupported scheme '{}' in Teller base URL",
                    other
                )));
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            access_token: access_token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch all accounts visible to the access token
    pub fn get_accounts(&self) -> Result<Vec<Account>> {
        let url = format!("{}/accounts", self.base_url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.access_token, Some(""))
            .send()
            .map_err(|e| self.map_request_error(e))?;

        self.check_response_status(&response)?;

        let wire_accounts: Vec<TellerAccount> = response.json().map_err(|e| {
            Error::upstream(format!("Failed to parse Teller accounts response: {}", e))
        })?;

        Ok(wire_accounts.iter().map(|a| self.map_account(a)).collect())
    }

    /// Fetch one page of transactions for an account, newest-first.
    ///
    /// `query.count` caps the page size; `query.from_id` restricts results
    /// to transactions strictly newer than that id. Upstream ordering is
    /// preserved as-is.
    pub fn get_transactions(
        &self,
        account_id: &str,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>> {
        let mut url = format!(
            "{}/accounts/{}/transactions?count={}",
            self.base_url, account_id, query.count
        );

        if let Some(from_id) = &query.from_id {
            url.push_str(&format!("&from_id={}", from_id));
        }

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.access_token, Some(""))
            .send()
            .map_err(|e| self.map_request_error(e))?;

        self.check_response_status(&response)?;

        let wire_transactions: Vec<TellerTransaction> = response.json().map_err(|e| {
            Error::upstream(format!(
                "Failed to parse Teller transactions response: {}",
                e
            ))
        })?;

        Ok(wire_transactions
            .iter()
            .map(|t| self.map_transaction(t, account_id))
            .collect())
    }

    /// Map Teller account to domain Account
    fn map_account(&self, wire: &TellerAccount) -> Account {
        let institution = Institution::new(&wire.institution.id, &wire.institution.name);
        let mut account = Account::new(&wire.id, institution, &wire.name);

        if !wire.account_type.is_empty() {
            account.account_type = wire.account_type.clone();
        }
        account.subtype = wire.subtype.clone();
        account.last_four = wire.last_four.clone();
        if !wire.currency.is_empty() {
            account.currency = Account::normalize_currency(&wire.currency);
        }
        account.status = wire.status.clone();

        account
    }

    /// Map Teller transaction to domain Transaction.
    ///
    /// The account id comes from the request path, not the payload; the
    /// path is what the caller asked for and is authoritative.
    fn map_transaction(&self, wire: &TellerTransaction, account_id: &str) -> Transaction {
        let mut tx = Transaction::new(
            &wire.id,
            account_id,
            wire.date,
            &wire.description,
            wire.amount,
        );

        if !wire.transaction_type.is_empty() {
            tx.transaction_type = wire.transaction_type.clone();
        }
        if !wire.status.is_empty() {
            tx.status = wire.status.clone();
        }
        tx.running_balance = wire.running_balance;
        tx.details = wire.details.clone();

        tx
    }

    /// Map request errors to user-friendly messages
    fn map_request_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::upstream("Connection timed out after 30 seconds")
        } else if error.is_connect() {
            Error::upstream("Unable to connect to Teller servers")
        } else {
            Error::upstream(format!("Teller request failed: {}", error))
        }
    }

    /// Check response status and return appropriate errors
    fn check_response_status(&self, response: &reqwest::blocking::Response) -> Result<()> {
        match response.status().as_u16() {
            200 => Ok(()),
            401 => Err(Error::credential(
                "Teller authentication failed. Your access token may be invalid or revoked.",
            )),
            403 => Err(Error::credential(
                "Teller access denied. The enrollment may have been disconnected.",
            )),
            404 => Err(Error::upstream("Teller resource not found (HTTP 404)")),
            429 => Err(Error::upstream(
                "Teller rate limit exceeded. Please wait a moment and try again.",
            )),
            status if status >= 500 => {
                Err(Error::upstream(format!("Teller service error: HTTP {}", status)))
            }
            status => Err(Error::upstream(format!("Teller API error: HTTP {}", status))),
        }
    }
}

// =============================================================================
// TellerSource - implements TransactionSource trait
// =============================================================================

/// Teller transaction source
///
/// Stateless; builds a client per call from the supplied credential so one
/// source instance can serve any number of enrollments.
pub struct TellerSource;

impl TellerSource {
    pub fn new() -> Self {
        Self
    }

    fn client_for(&self, credential: &Credential) -> Result<TellerClient> {
        match &credential.base_url {
            Some(url) => TellerClient::new_with_base_url(&credential.access_token, url),
            None => TellerClient::new(&credential.access_token),
        }
    }
}

impl Default for TellerSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionSource for TellerSource {
    fn name(&self) -> &str {
        "teller"
    }

    fn list_accounts(&self, credential: &Credential) -> Result<Vec<Account>> {
        self.client_for(credential)?.get_accounts()
    }

    fn list_transactions(
        &self,
        credential: &Credential,
        account_id: &str,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>> {
        self.client_for(credential)?
            .get_transactions(account_id, query)
    }
}

// =============================================================================
// Tests
// =============================================================================
