//! Command Handlers module
//!
//! Command handlers that orchestrate the core business operations.
//! Each handler coordinates the ledger store and the audit sink.

mod account_handler;
mod close_handler;
mod commands;
mod freeze_handler;
mod transfer_handler;

#[cfg(test)]
mod tests;

pub use account_handler::CreateAccountHandler;
pub use close_handler::CloseAccountHandler;
pub use commands::*;
pub use freeze_handler::{FreezeAccountHandler, UnfreezeAccountHandler};
pub use transfer_handler::TransferHandler;
