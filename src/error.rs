//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::ledger::LedgerError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Conflict: {0}")]
    Conflict(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] crate::domain::DomainError),

    // Server errors (5xx)
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl From<crate::audit::AuditLogError> for AppError {
    fn from(err: crate::audit::AuditLogError) -> Self {
        match err {
            crate::audit::AuditLogError::Database(e) => AppError::Database(e),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }

            // 401 Unauthorized
            AppError::InvalidApiKey => {
                (StatusCode::UNAUTHORIZED, "invalid_api_key", None)
            }

            // 403 Forbidden
            AppError::PermissionDenied => {
                (StatusCode::FORBIDDEN, "permission_denied", None)
            }

            // 409 Conflict
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, "conflict", Some(msg.clone()))
            }

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(ref domain_err) => {
                use crate::domain::DomainError;
                match domain_err {
                    DomainError::InvalidAmount(msg) => {
                        (StatusCode::BAD_REQUEST, "invalid_amount", Some(msg.clone()))
                    }
                    DomainError::InvalidEnumValue { .. } => {
                        (StatusCode::BAD_REQUEST, "invalid_enum_value", Some(domain_err.to_string()))
                    }
                    DomainError::NegativeOpeningBalance => {
                        (StatusCode::BAD_REQUEST, "negative_opening_balance", None)
                    }
                    DomainError::SameAccountTransfer => {
                        (StatusCode::BAD_REQUEST, "same_account_transfer", None)
                    }
                    DomainError::InsufficientBalance { .. } => {
                        (StatusCode::BAD_REQUEST, "insufficient_balance", Some(domain_err.to_string()))
                    }
                    DomainError::InactiveAccount { .. } => {
                        (StatusCode::BAD_REQUEST, "account_not_active", Some(domain_err.to_string()))
                    }
                    DomainError::UserNotFound(id) => {
                        (StatusCode::NOT_FOUND, "user_not_found", Some(id.clone()))
                    }
                    DomainError::AccountNotFound(id) => {
                        (StatusCode::NOT_FOUND, "account_not_found", Some(id.clone()))
                    }
                    DomainError::ReceiverNotFound(number) => {
                        (StatusCode::NOT_FOUND, "receiver_not_found", Some(number.clone()))
                    }
                    DomainError::TransactionNotFound(id) => {
                        (StatusCode::NOT_FOUND, "transaction_not_found", Some(id.clone()))
                    }
                    DomainError::OwnershipViolation => {
                        (StatusCode::FORBIDDEN, "ownership_violation", None)
                    }
                    DomainError::AlreadyFrozen => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "already_frozen", None)
                    }
                    DomainError::NotFrozen => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "not_frozen", None)
                    }
                    DomainError::AccountClosed => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "account_closed", None)
                    }
                    DomainError::BalanceNotZero { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "balance_not_zero", Some(domain_err.to_string()))
                    }
                    DomainError::AccountLimitReached { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "account_limit_reached", Some(domain_err.to_string()))
                    }
                }
            }

            // Ledger errors
            AppError::Ledger(ref ledger_err) => match ledger_err {
                LedgerError::MaxRetriesExceeded => {
                    // Transient contention: the caller may retry
                    (StatusCode::CONFLICT, "transfer_conflict", None)
                }
                LedgerError::AccountNumberExhausted => {
                    tracing::error!("Account number allocation exhausted");
                    (StatusCode::INTERNAL_SERVER_ERROR, "account_number_exhausted", None)
                }
                LedgerError::DuplicateAccountNumber(number) => {
                    (StatusCode::CONFLICT, "duplicate_account_number", Some(number.clone()))
                }
                LedgerError::Database(e) => {
                    tracing::error!("Ledger database error: {:?}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
                }
            },

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;

    #[test]
    fn test_domain_error_wrapping() {
        let err: AppError = DomainError::OwnershipViolation.into();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::OwnershipViolation)
        ));
    }

    #[test]
    fn test_ledger_error_wrapping() {
        let err: AppError = LedgerError::MaxRetriesExceeded.into();
        assert!(matches!(err, AppError::Ledger(LedgerError::MaxRetriesExceeded)));
    }
}
