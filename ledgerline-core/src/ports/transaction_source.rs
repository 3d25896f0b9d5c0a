//! Transaction source port
//!
//! Defines the interface for fetching account and transaction data from the
//! upstream banking API.

use crate::domain::result::Result;
use crate::domain::{Account, Transaction};

/// Access credential for the upstream API
///
/// Wraps the opaque access token authorizing one end-user's linked
/// accounts, plus an optional base URL override for sandbox and test
/// servers.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
    pub base_url: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Parameters of one bounded transaction fetch
#[derive(Debug, Clone)]
pub struct TransactionQuery {
    /// Maximum number of transactions to return
    pub count: usize,
    /// Exclusive lower bound: only transactions newer than this id
    pub from_id: Option<String>,
}

/// Transaction source trait
///
/// Implementations pull account and transaction data from the upstream
/// banking API. The SyncService drives this trait without knowing the wire
/// details.
///
/// `list_transactions` must return transactions newest-first, capped at
/// `query.count`. With `query.from_id` set, only transactions strictly
/// newer than that id are returned, and the cap keeps the entries closest
/// to the watermark so repeated calls walk forward through history without
/// gaps. Without `from_id` the cap keeps the most recent entries. The
/// source never paginates on its own; the caller decides when to fetch
/// again.
pub trait TransactionSource: Send + Sync {
    /// Source name (e.g., "teller")
    fn name(&self) -> &str;

    /// List all accounts visible to the credential
    fn list_accounts(&self, credential: &Credential) -> Result<Vec<Account>>;

    /// Fetch one page of transactions for an account, newest-first
    fn list_transactions(
        &self,
        credential: &Credential,
        account_id: &str,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>>;
}
