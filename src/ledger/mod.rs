//! Ledger Store module
//!
//! Persistence layer for accounts and the append-only transaction ledger.

mod error;
mod repository;

pub use error::LedgerError;
pub use repository::{
    AccountRecord, HistoryFilter, LedgerRepository, TransactionRecord, UserRecord,
};
