//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod cursor;
pub mod result;
mod transaction;

pub use account::{Account, Institution};
pub use cursor::SyncCursor;
pub use transaction::Transaction;
