//! Transfer Handler
//!
//! Executes internal and external transfers with full validation:
//! validate, lock and check balance, mutate atomically, record the
//! DEBIT/CREDIT pair, emit the audit entry.

use std::str::FromStr;
use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLogBuilder, AuditLogService};
use crate::domain::{AccountStatus, Amount, DomainError, OperationContext};
use crate::error::AppError;
use crate::ledger::{AccountRecord, LedgerError, LedgerRepository};

use super::{ExternalTransferCommand, InternalTransferCommand, TransferResult};

/// Bounded retry for lock contention (serialization failures, deadlocks)
const MAX_RETRIES: u32 = 3;

/// Handler for money movement between accounts
pub struct TransferHandler {
    ledger: LedgerRepository,
    audit: AuditLogService,
}

impl TransferHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: LedgerRepository::new(pool.clone()),
            audit: AuditLogService::new(pool),
        }
    }

    // =========================================================================
    // Internal transfer: both accounts owned by the acting user
    // =========================================================================

    /// Execute an internal transfer
    pub async fn internal(
        &self,
        command: InternalTransferCommand,
        context: &OperationContext,
    ) -> Result<TransferResult, AppError> {
        let amount = Amount::from_str(&command.amount).map_err(DomainError::from)?;

        if command.sender_account_id == command.receiver_account_id {
            return Err(DomainError::SameAccountTransfer.into());
        }

        for attempt in 0..MAX_RETRIES {
            match self.try_internal(&command, &amount, context).await {
                Err(AppError::Ledger(ref e)) if e.is_retryable() && attempt < MAX_RETRIES - 1 => {
                    let delay = Duration::from_millis(50 * (attempt as u64 + 1));
                    tokio::time::sleep(delay).await;
                    tracing::warn!(
                        "Lock contention on internal transfer, retrying (attempt {}/{})",
                        attempt + 1,
                        MAX_RETRIES
                    );
                    continue;
                }
                other => return other,
            }
        }

        Err(LedgerError::MaxRetriesExceeded.into())
    }

    /// Single attempt at an internal transfer
    async fn try_internal(
        &self,
        command: &InternalTransferCommand,
        amount: &Amount,
        context: &OperationContext,
    ) -> Result<TransferResult, AppError> {
        let mut tx = self.ledger.begin().await?;

        // Lock both account rows in ascending id order so two concurrent
        // transfers over the same pair cannot deadlock.
        let (first_id, second_id) = if command.sender_account_id <= command.receiver_account_id {
            (command.sender_account_id, command.receiver_account_id)
        } else {
            (command.receiver_account_id, command.sender_account_id)
        };

        let first = self.ledger.lock_account(&mut tx, first_id).await?;
        let second = self.ledger.lock_account(&mut tx, second_id).await?;

        let (sender, receiver) = if first_id == command.sender_account_id {
            (first, second)
        } else {
            (second, first)
        };

        let sender = match sender {
            Some(sender) => sender,
            None => {
                return Err(
                    DomainError::AccountNotFound(command.sender_account_id.to_string()).into(),
                )
            }
        };
        let receiver = match receiver {
            Some(receiver) => receiver,
            None => {
                return Err(
                    DomainError::AccountNotFound(command.receiver_account_id.to_string()).into(),
                )
            }
        };

        // Both accounts must belong to the acting user. A mismatch is a
        // security signal, not just a validation error.
        if sender.user_id != command.acting_user_id || receiver.user_id != command.acting_user_id {
            tx.rollback().await.ok();
            self.audit
                .record(
                    AuditLogBuilder::new(AuditAction::SuspiciousActivity)
                        .resource_type("transaction")
                        .details("Attempted internal transfer with invalid account ownership"),
                    context,
                )
                .await;
            return Err(DomainError::OwnershipViolation.into());
        }

        self.check_statuses(&sender, &receiver)?;

        if !sender_balance_sufficient(&sender, amount) {
            tx.rollback().await.ok();
            self.audit
                .record(
                    AuditLogBuilder::new(AuditAction::SuspiciousActivity)
                        .resource_type("transaction")
                        .details(format!("Insufficient balance for transfer: {}", amount)),
                    context,
                )
                .await;
            return Err(
                DomainError::insufficient_balance(amount.value(), sender.balance).into(),
            );
        }

        let description = command
            .description
            .clone()
            .unwrap_or_else(|| "Internal transfer".to_string());

        let (transaction_id, created_at) = self
            .commit_transfer(
                tx,
                &sender,
                &receiver,
                amount,
                &description,
                command.acting_user_id,
            )
            .await?;

        self.audit
            .record(
                AuditLogBuilder::new(AuditAction::Transfer)
                    .resource_type("transaction")
                    .resource_id(transaction_id)
                    .details(format!(
                        "Internal transfer: {} from {} to {}",
                        amount, sender.account_number, receiver.account_number
                    )),
                context,
            )
            .await;

        Ok(TransferResult {
            transaction_id,
            sender_account: sender.account_number,
            receiver_account: receiver.account_number,
            amount: amount.value(),
            created_at,
        })
    }

    // =========================================================================
    // External transfer: receiver looked up by account number, any owner
    // =========================================================================

    /// Execute an external transfer
    pub async fn external(
        &self,
        command: ExternalTransferCommand,
        context: &OperationContext,
    ) -> Result<TransferResult, AppError> {
        let amount = Amount::from_str(&command.amount).map_err(DomainError::from)?;

        for attempt in 0..MAX_RETRIES {
            match self.try_external(&command, &amount, context).await {
                Err(AppError::Ledger(ref e)) if e.is_retryable() && attempt < MAX_RETRIES - 1 => {
                    let delay = Duration::from_millis(50 * (attempt as u64 + 1));
                    tokio::time::sleep(delay).await;
                    tracing::warn!(
                        "Lock contention on external transfer, retrying (attempt {}/{})",
                        attempt + 1,
                        MAX_RETRIES
                    );
                    continue;
                }
                other => return other,
            }
        }

        Err(LedgerError::MaxRetriesExceeded.into())
    }

    /// Single attempt at an external transfer
    async fn try_external(
        &self,
        command: &ExternalTransferCommand,
        amount: &Amount,
        context: &OperationContext,
    ) -> Result<TransferResult, AppError> {
        let mut tx = self.ledger.begin().await?;

        let sender = self
            .ledger
            .lock_account(&mut tx, command.sender_account_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(command.sender_account_id.to_string()))?;

        // Only the sender side is ownership-checked; the receiver belonging
        // to someone else is the point of an external transfer.
        if sender.user_id != command.acting_user_id {
            tx.rollback().await.ok();
            self.audit
                .record(
                    AuditLogBuilder::new(AuditAction::SuspiciousActivity)
                        .resource_type("transaction")
                        .details("Attempted external transfer with invalid account ownership"),
                    context,
                )
                .await;
            return Err(DomainError::OwnershipViolation.into());
        }

        if sender.status != AccountStatus::Active {
            return Err(DomainError::InactiveAccount { side: "Sender" }.into());
        }

        // Probing for valid account numbers is a security signal.
        let receiver_id = match self
            .ledger
            .resolve_account_id(&mut tx, &command.receiver_account_number)
            .await?
        {
            Some(id) => id,
            None => {
                tx.rollback().await.ok();
                self.audit
                    .record(
                        AuditLogBuilder::new(AuditAction::SuspiciousActivity)
                            .resource_type("transaction")
                            .details(format!(
                                "Transfer to non-existent account: {}",
                                command.receiver_account_number
                            )),
                        context,
                    )
                    .await;
                return Err(
                    DomainError::ReceiverNotFound(command.receiver_account_number.clone()).into(),
                );
            }
        };

        if receiver_id == sender.id {
            return Err(DomainError::SameAccountTransfer.into());
        }

        // The sender lock is already held, so this second lock can be out of
        // id order; an opposing transfer taking locks the other way around
        // is broken up by Postgres deadlock detection and lands in the
        // bounded retry above.
        let receiver = self
            .ledger
            .lock_account(&mut tx, receiver_id)
            .await?
            .ok_or_else(|| {
                DomainError::ReceiverNotFound(command.receiver_account_number.clone())
            })?;

        if receiver.status != AccountStatus::Active {
            return Err(DomainError::InactiveAccount { side: "Receiver" }.into());
        }

        if !sender_balance_sufficient(&sender, amount) {
            tx.rollback().await.ok();
            self.audit
                .record(
                    AuditLogBuilder::new(AuditAction::SuspiciousActivity)
                        .resource_type("transaction")
                        .details(format!(
                            "Insufficient balance for external transfer: {}",
                            amount
                        )),
                    context,
                )
                .await;
            return Err(
                DomainError::insufficient_balance(amount.value(), sender.balance).into(),
            );
        }

        let description = command
            .description
            .clone()
            .unwrap_or_else(|| "External transfer".to_string());

        let (transaction_id, created_at) = self
            .commit_transfer(
                tx,
                &sender,
                &receiver,
                amount,
                &description,
                command.acting_user_id,
            )
            .await?;

        self.audit
            .record(
                AuditLogBuilder::new(AuditAction::Transfer)
                    .resource_type("transaction")
                    .resource_id(transaction_id)
                    .details(format!(
                        "External transfer: {} from {} to {}",
                        amount, sender.account_number, receiver.account_number
                    )),
                context,
            )
            .await;

        Ok(TransferResult {
            transaction_id,
            sender_account: sender.account_number,
            receiver_account: receiver.account_number,
            amount: amount.value(),
            created_at,
        })
    }

    // =========================================================================
    // Shared commit path
    // =========================================================================

    /// Status checks for the two sides, sender first
    fn check_statuses(
        &self,
        sender: &AccountRecord,
        receiver: &AccountRecord,
    ) -> Result<(), AppError> {
        if sender.status != AccountStatus::Active {
            return Err(DomainError::InactiveAccount { side: "Sender" }.into());
        }
        if receiver.status != AccountStatus::Active {
            return Err(DomainError::InactiveAccount { side: "Receiver" }.into());
        }
        Ok(())
    }

    /// Debit, credit, record the pair, and commit as one unit. Any failure
    /// inside rolls the whole transaction back: no partial state survives.
    async fn commit_transfer(
        &self,
        mut tx: sqlx::Transaction<'static, sqlx::Postgres>,
        sender: &AccountRecord,
        receiver: &AccountRecord,
        amount: &Amount,
        description: &str,
        acting_user_id: Uuid,
    ) -> Result<(Uuid, chrono::DateTime<chrono::Utc>), AppError> {
        let transaction_id = Uuid::new_v4();

        let created_at = self
            .ledger
            .apply_transfer(
                &mut tx,
                transaction_id,
                acting_user_id,
                sender.id,
                receiver.id,
                amount,
                description,
            )
            .await?;

        tx.commit().await.map_err(LedgerError::from)?;

        tracing::info!(
            transaction_id = %transaction_id,
            sender = %sender.account_number,
            receiver = %receiver.account_number,
            amount = %amount,
            "Transfer committed"
        );

        Ok((transaction_id, created_at))
    }
}

fn sender_balance_sufficient(sender: &AccountRecord, amount: &Amount) -> bool {
    sender.balance >= amount.value()
}
