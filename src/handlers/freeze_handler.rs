//! Freeze / Unfreeze Handlers
//!
//! Administrative suspension of an account. Each transition is a single
//! row update validated against the persisted status at commit time, so a
//! concurrent transition cannot leave the account in an undefined state.

use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLogBuilder, AuditLogService};
use crate::domain::{AccountStatus, DomainError, OperationContext};
use crate::error::AppError;
use crate::ledger::LedgerRepository;

use super::AccountStatusResult;

/// Handler for freezing accounts (admin-only operation)
pub struct FreezeAccountHandler {
    ledger: LedgerRepository,
    audit: AuditLogService,
}

impl FreezeAccountHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: LedgerRepository::new(pool.clone()),
            audit: AuditLogService::new(pool),
        }
    }

    /// ACTIVE -> FROZEN. Rejected when already frozen or closed.
    pub async fn execute(
        &self,
        account_id: Uuid,
        context: &OperationContext,
    ) -> Result<AccountStatusResult, AppError> {
        let transitioned = self
            .ledger
            .transition_status(account_id, AccountStatus::Active, AccountStatus::Frozen)
            .await?;

        match transitioned {
            Some(account_number) => {
                self.audit
                    .record(
                        AuditLogBuilder::new(AuditAction::AccountFreeze)
                            .resource_type("account")
                            .resource_id(account_id)
                            .details(format!("Account frozen: {}", account_number)),
                        context,
                    )
                    .await;

                Ok(AccountStatusResult {
                    account_id,
                    account_number,
                    status: AccountStatus::Frozen,
                })
            }
            None => {
                Err(diagnose_transition_failure(&self.ledger, account_id, AccountStatus::Active)
                    .await?)
            }
        }
    }
}

/// Handler for unfreezing accounts (admin-only operation)
pub struct UnfreezeAccountHandler {
    ledger: LedgerRepository,
    audit: AuditLogService,
}

impl UnfreezeAccountHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: LedgerRepository::new(pool.clone()),
            audit: AuditLogService::new(pool),
        }
    }

    /// FROZEN -> ACTIVE. Rejected for any account that is not frozen.
    pub async fn execute(
        &self,
        account_id: Uuid,
        context: &OperationContext,
    ) -> Result<AccountStatusResult, AppError> {
        let transitioned = self
            .ledger
            .transition_status(account_id, AccountStatus::Frozen, AccountStatus::Active)
            .await?;

        match transitioned {
            Some(account_number) => {
                self.audit
                    .record(
                        AuditLogBuilder::new(AuditAction::AccountUnfreeze)
                            .resource_type("account")
                            .resource_id(account_id)
                            .details(format!("Account unfrozen: {}", account_number)),
                        context,
                    )
                    .await;

                Ok(AccountStatusResult {
                    account_id,
                    account_number,
                    status: AccountStatus::Active,
                })
            }
            None => {
                Err(diagnose_transition_failure(&self.ledger, account_id, AccountStatus::Frozen)
                    .await?)
            }
        }
    }
}

/// Re-read the row a failed transition saw and turn its actual status into
/// the precise precondition error.
async fn diagnose_transition_failure(
    ledger: &LedgerRepository,
    account_id: Uuid,
    expected: AccountStatus,
) -> Result<AppError, AppError> {
    let account = ledger
        .get_account(account_id)
        .await?
        .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()))?;

    Ok(match (expected, account.status) {
        (AccountStatus::Active, AccountStatus::Frozen) => DomainError::AlreadyFrozen.into(),
        (AccountStatus::Active, AccountStatus::Closed) => DomainError::AccountClosed.into(),
        (AccountStatus::Frozen, AccountStatus::Active | AccountStatus::Closed) => {
            DomainError::NotFrozen.into()
        }
        // The precondition held at re-read time: another transition won and
        // lost in between. Last-committed-wins; the caller may retry.
        _ => AppError::Conflict("Concurrent status change".to_string()),
    })
}
