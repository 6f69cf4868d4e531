//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;

use super::amount::AmountError;

/// Domain-specific errors
///
/// These errors represent business rule violations and domain invariant
/// failures. They are independent of the web/infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid amount (zero, negative, too many decimals, or exceeds limit)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Unrecognized enum string at the boundary
    #[error("Invalid {kind}: {value}")]
    InvalidEnumValue { kind: &'static str, value: String },

    /// Opening balance below zero at account creation
    #[error("Opening balance cannot be negative")]
    NegativeOpeningBalance,

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// External transfer receiver lookup failed (security-relevant)
    #[error("Receiver account not found: {0}")]
    ReceiverNotFound(String),

    /// Transaction not found
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Acting user does not own the account involved (security-relevant)
    #[error("Invalid account ownership")]
    OwnershipViolation,

    /// Account on the given side of the transfer is not active
    #[error("{side} account is not active")]
    InactiveAccount { side: &'static str },

    /// Insufficient balance for debit operation (security-relevant)
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    /// Transfer to same account
    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    /// Freeze on an already frozen account
    #[error("Account is already frozen")]
    AlreadyFrozen,

    /// Unfreeze on an account that is not frozen
    #[error("Account is not frozen")]
    NotFrozen,

    /// Closed accounts accept no further transitions
    #[error("Account is closed")]
    AccountClosed,

    /// Close with a remaining balance
    #[error("Cannot close account with remaining balance: {balance}")]
    BalanceNotZero { balance: Decimal },

    /// Per-user account cap
    #[error("Account limit reached. Maximum {limit} accounts per user.")]
    AccountLimitReached { limit: i64 },
}

impl DomainError {
    /// Create an insufficient balance error
    pub fn insufficient_balance(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientBalance {
            required,
            available,
        }
    }

    /// Check if this is a client error (user's fault)
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::UserNotFound(_)
                | Self::AccountNotFound(_)
                | Self::ReceiverNotFound(_)
                | Self::TransactionNotFound(_)
        )
    }

    /// Errors that additionally produce a suspicious-activity audit entry
    pub fn is_security_relevant(&self) -> bool {
        matches!(
            self,
            Self::OwnershipViolation
                | Self::InsufficientBalance { .. }
                | Self::ReceiverNotFound(_)
        )
    }
}

impl From<AmountError> for DomainError {
    fn from(err: AmountError) -> Self {
        DomainError::InvalidAmount(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_error() {
        let err = DomainError::insufficient_balance(Decimal::new(100, 0), Decimal::new(50, 0));

        assert!(err.is_client_error());
        assert!(err.is_security_relevant());
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn test_ownership_violation_is_security_relevant() {
        assert!(DomainError::OwnershipViolation.is_security_relevant());
        assert!(!DomainError::AlreadyFrozen.is_security_relevant());
        assert!(!DomainError::AccountNotFound("x".into()).is_security_relevant());
        assert!(DomainError::ReceiverNotFound("ACC-0000000000".into()).is_security_relevant());
    }

    #[test]
    fn test_amount_error_conversion() {
        let err: DomainError = AmountError::NotPositive(Decimal::ZERO).into();
        assert!(matches!(err, DomainError::InvalidAmount(_)));
    }

    #[test]
    fn test_inactive_account_sides() {
        let sender = DomainError::InactiveAccount { side: "Sender" };
        let receiver = DomainError::InactiveAccount { side: "Receiver" };
        assert!(sender.to_string().starts_with("Sender"));
        assert!(receiver.to_string().starts_with("Receiver"));
    }
}
