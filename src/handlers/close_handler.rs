//! Close Account Handler
//!
//! Closing requires an exactly zero balance and is terminal: a closed
//! account never transitions again.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLogBuilder, AuditLogService};
use crate::domain::{AccountStatus, DomainError, OperationContext};
use crate::error::AppError;
use crate::ledger::LedgerRepository;

use super::AccountStatusResult;

/// Handler for closing accounts (admin-only operation)
pub struct CloseAccountHandler {
    ledger: LedgerRepository,
    audit: AuditLogService,
}

impl CloseAccountHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: LedgerRepository::new(pool.clone()),
            audit: AuditLogService::new(pool),
        }
    }

    /// ACTIVE or FROZEN -> CLOSED, only with balance == 0 exactly.
    pub async fn execute(
        &self,
        account_id: Uuid,
        context: &OperationContext,
    ) -> Result<AccountStatusResult, AppError> {
        let closed = self.ledger.close_account(account_id).await?;

        match closed {
            Some(account_number) => {
                self.audit
                    .record(
                        AuditLogBuilder::new(AuditAction::AdminAction)
                            .resource_type("account")
                            .resource_id(account_id)
                            .details(format!("Account closed: {}", account_number)),
                        context,
                    )
                    .await;

                Ok(AccountStatusResult {
                    account_id,
                    account_number,
                    status: AccountStatus::Closed,
                })
            }
            None => {
                let account = self
                    .ledger
                    .get_account(account_id)
                    .await?
                    .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()))?;

                if account.status == AccountStatus::Closed {
                    return Err(DomainError::AccountClosed.into());
                }
                if account.balance != Decimal::ZERO {
                    return Err(DomainError::BalanceNotZero {
                        balance: account.balance,
                    }
                    .into());
                }

                // Balance is zero and the account is not closed at re-read
                // time: a concurrent transfer or transition got in between.
                Err(AppError::Conflict("Concurrent account change".to_string()))
            }
        }
    }
}
