//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the Record Store and Cursor Store ports
//! - Teller HTTP client for the Transaction Source port

pub mod duckdb;
pub mod teller;

#[cfg(test)]
pub mod teller_mock;
