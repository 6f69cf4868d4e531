//! Create Account Handler
//!
//! Opens a new account for a user: validates the owner, the per-user cap,
//! the account type and the opening balance, then allocates a unique
//! account number and inserts the row.

use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::audit::{AuditAction, AuditLogBuilder, AuditLogService};
use crate::domain::{AccountType, Balance, DomainError, OperationContext};
use crate::error::AppError;
use crate::ledger::{LedgerError, LedgerRepository};

use super::{CreateAccountCommand, CreateAccountResult};

/// Hard cap on accounts per user
const MAX_ACCOUNTS_PER_USER: i64 = 20;

/// Redraws when an allocated number is raced to the unique index
const MAX_INSERT_ATTEMPTS: u32 = 3;

/// Handler for account creation
pub struct CreateAccountHandler {
    ledger: LedgerRepository,
    audit: AuditLogService,
}

impl CreateAccountHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: LedgerRepository::new(pool.clone()),
            audit: AuditLogService::new(pool),
        }
    }

    /// Execute the create-account command
    pub async fn execute(
        &self,
        command: CreateAccountCommand,
        context: &OperationContext,
    ) -> Result<CreateAccountResult, AppError> {
        // Parse-and-validate the string inputs before touching the store
        let account_type = AccountType::from_str(&command.account_type)?;

        let opening_balance = Decimal::from_str(&command.opening_balance)
            .map_err(|e| DomainError::InvalidAmount(e.to_string()))?;

        if opening_balance < Decimal::ZERO {
            return Err(DomainError::NegativeOpeningBalance.into());
        }

        let opening_balance = Balance::new(opening_balance)
            .map_err(DomainError::from)?
            .value();

        let user = self
            .ledger
            .get_user(command.user_id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(command.user_id.to_string()))?;

        let existing = self.ledger.count_user_accounts(user.id).await?;
        if existing >= MAX_ACCOUNTS_PER_USER {
            return Err(DomainError::AccountLimitReached {
                limit: MAX_ACCOUNTS_PER_USER,
            }
            .into());
        }

        // Random draw with uniqueness retry; a concurrent creation can still
        // win the unique index between check and insert, so redraw on that too.
        for _ in 0..MAX_INSERT_ATTEMPTS {
            let account_number = self.ledger.generate_account_number().await?;

            match self
                .ledger
                .insert_account(user.id, &account_number, account_type, opening_balance)
                .await
            {
                Ok(account) => {
                    self.audit
                        .record(
                            AuditLogBuilder::new(AuditAction::AdminAction)
                                .resource_type("account")
                                .resource_id(account.id)
                                .details(format!("Account created: {}", account.account_number)),
                            context,
                        )
                        .await;

                    return Ok(CreateAccountResult {
                        account_id: account.id,
                        account_number: account.account_number,
                        account_type: account.account_type,
                        balance: account.balance,
                        status: account.status,
                        created_at: account.created_at,
                    });
                }
                Err(LedgerError::DuplicateAccountNumber(number)) => {
                    tracing::warn!(
                        account_number = %number,
                        "Account number raced by concurrent creation, redrawing"
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::AccountNumberExhausted.into())
    }
}
