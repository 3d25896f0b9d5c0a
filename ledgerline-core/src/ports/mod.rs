//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod cursor_store;
mod record_store;
mod transaction_source;

pub use cursor_store::CursorStore;
pub use record_store::RecordStore;
pub use transaction_source::{Credential, TransactionQuery, TransactionSource};
