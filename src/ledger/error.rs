//! Ledger Store Errors
//!
//! Error types for ledger store operations.

/// Errors that can occur in the ledger store
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Account number collided with an existing row
    #[error("Account number already exists: {0}")]
    DuplicateAccountNumber(String),

    /// Uniqueness retry loop for account numbers ran out of attempts
    #[error("Exhausted attempts to allocate a unique account number")]
    AccountNumberExhausted,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Maximum retries exceeded for a contended transaction
    #[error("Maximum retries exceeded for atomic operation")]
    MaxRetriesExceeded,
}

impl LedgerError {
    /// Lock contention that a bounded retry may resolve
    /// (Postgres serialization_failure / deadlock_detected)
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Database(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_not_retryable() {
        assert!(!LedgerError::AccountNumberExhausted.is_retryable());
        assert!(!LedgerError::MaxRetriesExceeded.is_retryable());
        assert!(!LedgerError::DuplicateAccountNumber("ACC-0000000000".into()).is_retryable());
    }

    #[test]
    fn test_row_not_found_not_retryable() {
        let err = LedgerError::Database(sqlx::Error::RowNotFound);
        assert!(!err.is_retryable());
    }
}
