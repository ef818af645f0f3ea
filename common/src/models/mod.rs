//! Shared data models.

pub mod transaction;

pub use transaction::{ResultSet, TransactionRecord};
