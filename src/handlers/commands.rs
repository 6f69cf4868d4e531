//! Command definitions
//!
//! Commands represent intentions to change the system state. Amounts travel
//! as strings and are parsed into validated `Amount` values by the handlers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AccountStatus, AccountType};

/// Command to move money between two accounts of the acting user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalTransferCommand {
    /// The authenticated user performing the transfer
    pub acting_user_id: Uuid,
    /// Sender account (must be owned by the acting user)
    pub sender_account_id: Uuid,
    /// Receiver account (must be owned by the acting user)
    pub receiver_account_id: Uuid,
    /// Amount to transfer (as string for precise decimal)
    pub amount: String,
    /// Optional description
    pub description: Option<String>,
}

impl InternalTransferCommand {
    pub fn new(
        acting_user_id: Uuid,
        sender_account_id: Uuid,
        receiver_account_id: Uuid,
        amount: String,
    ) -> Self {
        Self {
            acting_user_id,
            sender_account_id,
            receiver_account_id,
            amount,
            description: None,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }
}

/// Command to move money to an account identified by number, regardless of owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalTransferCommand {
    /// The authenticated user performing the transfer
    pub acting_user_id: Uuid,
    /// Sender account (must be owned by the acting user)
    pub sender_account_id: Uuid,
    /// Externally visible number of the receiving account
    pub receiver_account_number: String,
    /// Amount to transfer (as string for precise decimal)
    pub amount: String,
    /// Optional description
    pub description: Option<String>,
}

impl ExternalTransferCommand {
    pub fn new(
        acting_user_id: Uuid,
        sender_account_id: Uuid,
        receiver_account_number: String,
        amount: String,
    ) -> Self {
        Self {
            acting_user_id,
            sender_account_id,
            receiver_account_number,
            amount,
            description: None,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }
}

/// Command to open a new account for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountCommand {
    /// Owner of the new account
    pub user_id: Uuid,
    /// Account type string, parsed at the boundary (checking/savings)
    pub account_type: String,
    /// Opening balance (as string for precise decimal)
    pub opening_balance: String,
}

impl CreateAccountCommand {
    pub fn new(user_id: Uuid, account_type: String, opening_balance: String) -> Self {
        Self {
            user_id,
            account_type,
            opening_balance,
        }
    }
}

/// Result of a successful transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub transaction_id: Uuid,
    pub sender_account: String,
    pub receiver_account: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful account creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountResult {
    pub account_id: Uuid,
    pub account_number: String,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful status transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountStatusResult {
    pub account_id: Uuid,
    pub account_number: String,
    pub status: AccountStatus,
}
