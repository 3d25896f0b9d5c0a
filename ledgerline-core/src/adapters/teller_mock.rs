//! Mock Teller API server for testing
//!
//! This module provides a mock HTTP server that simulates the Teller API,
//! allowing for comprehensive testing without a real Teller enrollment.
//!
//! The mock server implements the same response structure as the real
//! Teller API:
//! - GET /accounts returns a bare array of accounts
//! - GET /accounts/{id}/transactions returns a bare array, newest-first,
//!   honoring the `count` cap and the `from_id` exclusive lower bound

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Mock Teller server for testing
pub struct MockTellerServer {
    port: u16,
    running: Arc<AtomicBool>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

/// Configuration for mock data generation
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Number of accounts to generate
    pub num_accounts: usize,
    /// Number of transactions per account
    pub num_transactions_per_account: usize,
    /// Whether to simulate authentication failure
    pub fail_auth: bool,
    /// Whether to simulate rate limiting
    pub rate_limit: bool,
    /// Delay in milliseconds before responding
    pub delay_ms: u64,
    /// Accounts whose transactions endpoint returns HTTP 500
    pub error_account_ids: Vec<String>,
}

impl MockConfig {
    /// Three accounts with fifty transactions each, everything healthy
    pub fn healthy() -> Self {
        Self {
            num_accounts: 3,
            num_transactions_per_account: 50,
            ..Default::default()
        }
    }
}

// Response structures matching the real API

#[derive(Serialize)]
struct MockInstitution {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct MockAccount {
    id: String,
    institution: MockInstitution,
    name: String,
    #[serde(rename = "type")]
    account_type: String,
    subtype: String,
    last_four: String,
    currency: String,
    status: String,
}

#[derive(Serialize)]
struct MockTransaction {
    id: String,
    account_id: String,
    date: String,
    description: String,
    amount: String,
    #[serde(rename = "type")]
    transaction_type: String,
    status: String,
    running_balance: Option<String>,
    details: JsonValue,
}

impl MockTellerServer {
    /// Start a new mock server on a random available port
    pub fn start(config: MockConfig) -> std::io::Result<Self> {
        Self::start_on_port(0, config)
    }

    /// Start mock server on a specific port (0 for random)
    pub fn start_on_port(port: u16, config: MockConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(format!("127.0.0.1:{}", port))?;
        let actual_port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        // Set listener to non-blocking for graceful shutdown
        listener.set_nonblocking(true)?;

        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let cfg = config.clone();
                        thread::spawn(move || {
                            handle_connection(stream, &cfg);
                        });
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        // No connection available, sleep briefly
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port: actual_port,
            running,
            thread_handle: Some(thread_handle),
        })
    }

    /// Get the port the server is listening on
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the base URL for this mock server
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockTellerServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_connection(mut stream: TcpStream, config: &MockConfig) {
    let mut buffer = [0; 4096];

    if let Ok(n) = stream.read(&mut buffer) {
        let request = String::from_utf8_lossy(&buffer[..n]);

        // Add configured delay
        if config.delay_ms > 0 {
            thread::sleep(std::time::Duration::from_millis(config.delay_ms));
        }

        // Parse request line
        let first_line = request.lines().next().unwrap_or("");
        let parts: Vec<&str> = first_line.split_whitespace().collect();

        if parts.len() < 2 {
            send_response(&mut stream, 400, "Bad Request", r#"{"error": "bad_request"}"#);
            return;
        }

        let method = parts[0];
        let path = parts[1];

        // Teller uses basic auth (token as username). The header value is
        // base64 so we only verify that basic auth was sent at all.
        let request_lower = request.to_lowercase();
        let has_auth = request_lower.contains("authorization: basic ");

        if config.fail_auth || !has_auth {
            send_response(
                &mut stream,
                401,
                "Unauthorized",
                r#"{"error": "invalid_token"}"#,
            );
            return;
        }

        if config.rate_limit {
            send_response(
                &mut stream,
                429,
                "Too Many Requests",
                r#"{"error": "rate_limited"}"#,
            );
            return;
        }

        let path_without_query = path.split('?').next().unwrap_or(path);

        match method {
            "GET" => {
                if path_without_query == "/accounts" {
                    // List accounts: GET /accounts (bare array)
                    let accounts = generate_mock_accounts(config.num_accounts);
                    let json = serde_json::to_string(&accounts).unwrap();
                    send_response(&mut stream, 200, "OK", &json);
                } else if path_without_query.starts_with("/accounts/")
                    && path_without_query.ends_with("/transactions")
                {
                    // Get transactions: GET /accounts/{id}/transactions
                    let account_id = extract_account_id(path_without_query);

                    if config.error_account_ids.contains(&account_id) {
                        send_response(
                            &mut stream,
                            500,
                            "Internal Server Error",
                            r#"{"error": "internal_server_error"}"#,
                        );
                        return;
                    }

                    match account_index(&account_id) {
                        Some(idx) if idx >= 1 && idx <= config.num_accounts => {}
                        _ => {
                            send_response(
                                &mut stream,
                                404,
                                "Not Found",
                                r#"{"error": "account_not_found"}"#,
                            );
                            return;
                        }
                    }

                    let (count, from_id) = parse_query(path);
                    let mut txs = generate_mock_transactions(
                        &account_id,
                        config.num_transactions_per_account,
                    );

                    // from_id is an exclusive lower bound: keep only entries
                    // strictly newer than it. An unknown watermark is ignored
                    // and the newest page is returned.
                    let count = count.unwrap_or(usize::MAX);
                    match from_id.and_then(|id| txs.iter().position(|t| t.id == id)) {
                        Some(pos) => {
                            txs.truncate(pos);
                            // The cap keeps the entries closest to the
                            // watermark so callers can walk forward through
                            // history without gaps
                            if txs.len() > count {
                                txs = txs.split_off(txs.len() - count);
                            }
                        }
                        None => txs.truncate(count),
                    }

                    let json = serde_json::to_string(&txs).unwrap();
                    send_response(&mut stream, 200, "OK", &json);
                } else {
                    send_response(
                        &mut stream,
                        404,
                        "Not Found",
                        r#"{"error": "endpoint_not_found"}"#,
                    );
                }
            }
            _ => {
                send_response(
                    &mut stream,
                    405,
                    "Method Not Allowed",
                    r#"{"error": "method_not_allowed"}"#,
                );
            }
        }
    }
}

fn extract_account_id(path: &str) -> String {
    // Extract account ID from paths like /accounts/acc_mock_1/transactions
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() >= 3 {
        parts[2].to_string()
    } else {
        String::new()
    }
}

fn account_index(account_id: &str) -> Option<usize> {
    account_id.strip_prefix("acc_mock_")?.parse::<usize>().ok()
}

fn parse_query(path: &str) -> (Option<usize>, Option<String>) {
    let mut count = None;
    let mut from_id = None;
    if let Some(query) = path.split('?').nth(1) {
        for pair in query.split('&') {
            let mut kv = pair.splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some("count"), Some(v)) => count = v.parse().ok(),
                (Some("from_id"), Some(v)) => from_id = Some(v.to_string()),
                _ => {}
            }
        }
    }
    (count, from_id)
}

fn send_response(stream: &mut TcpStream, status: u16, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

const INSTITUTIONS: &[(&str, &str)] = &[
    ("chase", "Chase"),
    ("bofa", "Bank of America"),
    ("wellsfargo", "Wells Fargo"),
    ("ally", "Ally Bank"),
    ("capital_one", "Capital One"),
];

// (description, amount, type, category)
const MERCHANTS: &[(&str, &str, &str, &str)] = &[
    ("WHOLEFDS MKT 10259", "-84.88", "card_payment", "groceries"),
    ("NETFLIX.COM", "-15.49", "card_payment", "entertainment"),
    ("SHELL OIL 57444", "-52.00", "card_payment", "fuel"),
    ("BLUE BOTTLE COFFEE", "-4.50", "card_payment", "dining"),
    ("PAYROLL ACME CORP", "2750.00", "ach", "income"),
    ("AMZN MKTP US", "-29.99", "card_payment", "shopping"),
    ("INTEREST PAYMENT", "0.42", "interest", "income"),
    ("TRANSFER TO SAVINGS", "-200.00", "transfer", "transfers"),
];

fn generate_mock_accounts(count: usize) -> Vec<MockAccount> {
    (0..count)
        .map(|i| {
            let (inst_id, inst_name) = INSTITUTIONS[i % INSTITUTIONS.len()];
            let subtype = ["checking", "savings", "credit_card"][i % 3];
            let account_type = if subtype == "credit_card" {
                "credit"
            } else {
                "depository"
            };
            let label = match subtype {
                "checking" => "Checking",
                "savings" => "Savings",
                _ => "Credit Card",
            };

            MockAccount {
                id: format!("acc_mock_{}", i + 1),
                institution: MockInstitution {
                    id: inst_id.to_string(),
                    name: inst_name.to_string(),
                },
                name: format!("{} {}", inst_name, label),
                account_type: account_type.to_string(),
                subtype: subtype.to_string(),
                last_four: format!("{:04}", 1000 + i),
                currency: "USD".to_string(),
                status: "open".to_string(),
            }
        })
        .collect()
}

/// Generate `count` transactions for an account, newest-first.
///
/// Ids are deterministic (`txn_mock_N_0007`) with the sequence number
/// increasing toward the newest entry, so tests can predict exactly which
/// page a given `from_id` produces.
fn generate_mock_transactions(account_id: &str, count: usize) -> Vec<MockTransaction> {
    let suffix = account_id.strip_prefix("acc_").unwrap_or(account_id);
    let today = Utc::now().naive_utc().date();

    (1..=count)
        .rev()
        .map(|seq| {
            let (description, amount, tx_type, category) = MERCHANTS[(seq - 1) % MERCHANTS.len()];
            let date = today - Duration::days((count - seq) as i64);
            let status = if seq == count { "pending" } else { "posted" };
            let running_balance = if seq % 7 == 0 {
                None
            } else {
                Some(format!("{}.17", 1000 + seq))
            };

            MockTransaction {
                id: format!("txn_{}_{:04}", suffix, seq),
                account_id: account_id.to_string(),
                date: date.format("%Y-%m-%d").to_string(),
                description: description.to_string(),
                amount: amount.to_string(),
                transaction_type: tx_type.to_string(),
                status: status.to_string(),
                running_balance,
                details: serde_json::json!({
                    "category": category,
                    "counterparty": {"name": description, "type": "organization"},
                    "processing_status": "complete"
                }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::teller::{TellerClient, TellerSource};
    use crate::ports::{Credential, TransactionQuery, TransactionSource};

    fn query(count: usize, from_id: Option<&str>) -> TransactionQuery {
        TransactionQuery {
            count,
            from_id: from_id.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_mock_server_starts() {
        let server = MockTellerServer::start(MockConfig::healthy()).unwrap();
        assert!(server.port() > 0);
    }

    #[test]
    fn test_mock_server_accounts() {
        let server = MockTellerServer::start(MockConfig {
            num_accounts: 5,
            ..MockConfig::healthy()
        })
        .unwrap();

        let client = TellerClient::new_with_base_url("test_token", &server.base_url()).unwrap();
        let accounts = client.get_accounts().unwrap();

        assert_eq!(accounts.len(), 5);
        assert_eq!(accounts[0].id, "acc_mock_1");
        assert_eq!(accounts[0].institution.name, "Chase");
        assert_eq!(accounts[0].subtype, Some("checking".to_string()));
        assert_eq!(accounts[2].account_type, "credit");
    }

    #[test]
    fn test_mock_server_transactions_newest_first() {
        let server = MockTellerServer::start(MockConfig {
            num_accounts: 1,
            num_transactions_per_account: 20,
            ..Default::default()
        })
        .unwrap();

        let client = TellerClient::new_with_base_url("test_token", &server.base_url()).unwrap();
        let txs = client
            .get_transactions("acc_mock_1", &query(500, None))
            .unwrap();

        assert_eq!(txs.len(), 20);
        assert_eq!(txs[0].id, "txn_mock_1_0020");
        assert_eq!(txs[19].id, "txn_mock_1_0001");
        // Dates never increase going down the page
        for pair in txs.windows(2) {
            assert!(pair[0].posted_date >= pair[1].posted_date);
        }
    }

    #[test]
    fn test_mock_server_count_cap() {
        let server = MockTellerServer::start(MockConfig {
            num_accounts: 1,
            num_transactions_per_account: 50,
            ..Default::default()
        })
        .unwrap();

        let client = TellerClient::new_with_base_url("test_token", &server.base_url()).unwrap();
        let txs = client
            .get_transactions("acc_mock_1", &query(10, None))
            .unwrap();

        assert_eq!(txs.len(), 10);
        assert_eq!(txs[0].id, "txn_mock_1_0050");
        assert_eq!(txs[9].id, "txn_mock_1_0041");
    }

    #[test]
    fn test_mock_server_from_id_exclusive() {
        let server = MockTellerServer::start(MockConfig {
            num_accounts: 1,
            num_transactions_per_account: 30,
            ..Default::default()
        })
        .unwrap();

        let client = TellerClient::new_with_base_url("test_token", &server.base_url()).unwrap();
        let txs = client
            .get_transactions("acc_mock_1", &query(500, Some("txn_mock_1_0025")))
            .unwrap();

        // Strictly newer than 0025: 0030 down to 0026
        assert_eq!(txs.len(), 5);
        assert_eq!(txs[0].id, "txn_mock_1_0030");
        assert_eq!(txs[4].id, "txn_mock_1_0026");
    }

    #[test]
    fn test_mock_server_from_id_with_count_keeps_oldest() {
        let server = MockTellerServer::start(MockConfig {
            num_accounts: 1,
            num_transactions_per_account: 30,
            ..Default::default()
        })
        .unwrap();

        let client = TellerClient::new_with_base_url("test_token", &server.base_url()).unwrap();
        let txs = client
            .get_transactions("acc_mock_1", &query(5, Some("txn_mock_1_0010")))
            .unwrap();

        // Twenty entries are newer than 0010; the page is the five closest
        // to the watermark, still newest-first within itself
        assert_eq!(txs.len(), 5);
        assert_eq!(txs[0].id, "txn_mock_1_0015");
        assert_eq!(txs[4].id, "txn_mock_1_0011");
    }

    #[test]
    fn test_mock_server_from_id_unknown_returns_newest_page() {
        let server = MockTellerServer::start(MockConfig {
            num_accounts: 1,
            num_transactions_per_account: 12,
            ..Default::default()
        })
        .unwrap();

        let client = TellerClient::new_with_base_url("test_token", &server.base_url()).unwrap();
        let txs = client
            .get_transactions("acc_mock_1", &query(5, Some("txn_mock_1_9999")))
            .unwrap();

        assert_eq!(txs.len(), 5);
        assert_eq!(txs[0].id, "txn_mock_1_0012");
    }

    #[test]
    fn test_mock_server_auth_failure() {
        let server = MockTellerServer::start(MockConfig {
            fail_auth: true,
            ..MockConfig::healthy()
        })
        .unwrap();

        let client = TellerClient::new_with_base_url("test_token", &server.base_url()).unwrap();
        let result = client.get_accounts();

        assert!(result.is_err());
        assert!(result.unwrap_err().is_credential());
    }

    #[test]
    fn test_mock_server_rate_limit() {
        let server = MockTellerServer::start(MockConfig {
            rate_limit: true,
            ..MockConfig::healthy()
        })
        .unwrap();

        let client = TellerClient::new_with_base_url("test_token", &server.base_url()).unwrap();
        let result = client.get_accounts();

        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string().to_lowercase();
        assert!(
            err_msg.contains("rate limit"),
            "Expected 'rate limit' in error, got: {}",
            err_msg
        );
    }

    #[test]
    fn test_mock_server_error_account() {
        let server = MockTellerServer::start(MockConfig {
            num_accounts: 2,
            num_transactions_per_account: 5,
            error_account_ids: vec!["acc_mock_2".to_string()],
            ..Default::default()
        })
        .unwrap();

        let client = TellerClient::new_with_base_url("test_token", &server.base_url()).unwrap();

        assert!(client.get_transactions("acc_mock_1", &query(10, None)).is_ok());

        let result = client.get_transactions("acc_mock_2", &query(10, None));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("HTTP 500"));
    }

    #[test]
    fn test_mock_server_unknown_account() {
        let server = MockTellerServer::start(MockConfig {
            num_accounts: 1,
            num_transactions_per_account: 5,
            ..Default::default()
        })
        .unwrap();

        let client = TellerClient::new_with_base_url("test_token", &server.base_url()).unwrap();
        let result = client.get_transactions("acc_mock_9", &query(10, None));
        assert!(result.is_err());
    }

    #[test]
    fn test_source_against_mock() {
        let server = MockTellerServer::start(MockConfig {
            num_accounts: 2,
            num_transactions_per_account: 8,
            ..Default::default()
        })
        .unwrap();

        let source = TellerSource::new();
        let credential = Credential::new("test_token").with_base_url(server.base_url());

        let accounts = source.list_accounts(&credential).unwrap();
        assert_eq!(accounts.len(), 2);

        let txs = source
            .list_transactions(&credential, &accounts[0].id, &query(3, None))
            .unwrap();
        assert_eq!(txs.len(), 3);
        assert_eq!(txs[0].account_id, "acc_mock_1");
    }
}
