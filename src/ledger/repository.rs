//! Ledger Store Repository
//!
//! Persistence layer for accounts and the append-only transaction ledger.
//! All money movement goes through `apply_transfer` inside a caller-owned
//! transaction with both account rows locked, so the balance check and the
//! debit are one atomic read-modify-write.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{AccountStatus, AccountType, Amount, TransactionType, UserRole};

use super::LedgerError;

/// Attempts before account-number allocation is treated as a fatal error
const MAX_NUMBER_ATTEMPTS: u32 = 10;

/// Account row
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: Uuid,
    pub account_number: String,
    pub user_id: Uuid,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub status: AccountStatus,
    pub opening_balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User row (read-mostly reference data maintained by the identity collaborator)
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub must_change_credentials: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One side of a recorded transfer, with account numbers resolved for display
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub transaction_id: Uuid,
    pub sender_id: Uuid,
    pub sender_account: String,
    pub receiver_account: String,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Optional filters for per-account history queries
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub transaction_type: Option<TransactionType>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub limit: i64,
    pub offset: i64,
}

impl HistoryFilter {
    pub fn page(limit: i64, offset: i64) -> Self {
        Self {
            limit,
            offset,
            ..Default::default()
        }
    }
}

type AccountRow = (
    Uuid,
    String,
    Uuid,
    AccountType,
    Decimal,
    AccountStatus,
    Decimal,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn account_from_row(row: AccountRow) -> AccountRecord {
    let (
        id,
        account_number,
        user_id,
        account_type,
        balance,
        status,
        opening_balance,
        created_at,
        updated_at,
    ) = row;
    AccountRecord {
        id,
        account_number,
        user_id,
        account_type,
        balance,
        status,
        opening_balance,
        created_at,
        updated_at,
    }
}

const ACCOUNT_COLUMNS: &str = "id, account_number, user_id, account_type, balance, status, \
                               opening_balance, created_at, updated_at";

type TransactionRow = (
    Uuid,
    Uuid,
    String,
    String,
    Decimal,
    TransactionType,
    String,
    DateTime<Utc>,
);

fn transaction_from_row(row: TransactionRow) -> TransactionRecord {
    let (
        transaction_id,
        sender_id,
        sender_account,
        receiver_account,
        amount,
        transaction_type,
        description,
        created_at,
    ) = row;
    TransactionRecord {
        transaction_id,
        sender_id,
        sender_account,
        receiver_account,
        amount,
        transaction_type,
        description,
        created_at,
    }
}

/// Ledger Store for accounts and transaction records
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    /// Create a new LedgerRepository with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a transaction for a multi-statement atomic operation
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, LedgerError> {
        Ok(self.pool.begin().await?)
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Load a user row
    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, LedgerError> {
        let row: Option<(
            Uuid,
            String,
            String,
            String,
            UserRole,
            bool,
            bool,
            DateTime<Utc>,
            DateTime<Utc>,
        )> = sqlx::query_as(
            r#"
            SELECT id, username, email, full_name, role, is_active,
                   must_change_credentials, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(
                id,
                username,
                email,
                full_name,
                role,
                is_active,
                must_change_credentials,
                created_at,
                updated_at,
            )| UserRecord {
                id,
                username,
                email,
                full_name,
                role,
                is_active,
                must_change_credentials,
                created_at,
                updated_at,
            },
        ))
    }

    // =========================================================================
    // Account reads
    // =========================================================================

    /// Load an account by ID (no lock)
    pub async fn get_account(&self, account_id: Uuid) -> Result<Option<AccountRecord>, LedgerError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(account_from_row))
    }

    /// Load an account by its externally visible number (no lock)
    pub async fn get_account_by_number(
        &self,
        account_number: &str,
    ) -> Result<Option<AccountRecord>, LedgerError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_number = $1"
        ))
        .bind(account_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(account_from_row))
    }

    /// Load an account row with a row-level lock held until the transaction ends.
    /// Callers locking two accounts must lock in ascending id order.
    pub async fn lock_account(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
    ) -> Result<Option<AccountRecord>, LedgerError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE"
        ))
        .bind(account_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(account_from_row))
    }

    /// Resolve an account number to its id without taking a lock.
    /// Used before locking so locks are always taken in id order.
    pub async fn resolve_account_id(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_number: &str,
    ) -> Result<Option<Uuid>, LedgerError> {
        let id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM accounts WHERE account_number = $1")
                .bind(account_number)
                .fetch_optional(&mut **tx)
                .await?;

        Ok(id)
    }

    /// All accounts owned by a user, oldest first
    pub async fn list_user_accounts(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<AccountRecord>, LedgerError> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = $1 ORDER BY created_at ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(account_from_row).collect())
    }

    /// Number of accounts a user currently owns (closed accounts included:
    /// they still count against the cap because rows are never deleted)
    pub async fn count_user_accounts(&self, user_id: Uuid) -> Result<i64, LedgerError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Account creation
    // =========================================================================

    /// Draw a candidate account number: ACC- followed by 10 decimal digits
    pub fn draw_account_number() -> String {
        let n: u64 = rand::thread_rng().gen_range(0..10_000_000_000);
        format!("ACC-{:010}", n)
    }

    /// Allocate an account number that does not collide with the store.
    /// Bounded so pathological collision rates cannot loop forever.
    pub async fn generate_account_number(&self) -> Result<String, LedgerError> {
        for _ in 0..MAX_NUMBER_ATTEMPTS {
            let candidate = Self::draw_account_number();

            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM accounts WHERE account_number = $1)",
            )
            .bind(&candidate)
            .fetch_one(&self.pool)
            .await?;

            if !exists {
                return Ok(candidate);
            }
        }

        Err(LedgerError::AccountNumberExhausted)
    }

    /// Insert a new account row. A concurrent allocation of the same number
    /// surfaces as `DuplicateAccountNumber` so the caller can redraw.
    pub async fn insert_account(
        &self,
        user_id: Uuid,
        account_number: &str,
        account_type: AccountType,
        opening_balance: Decimal,
    ) -> Result<AccountRecord, LedgerError> {
        let row: Result<AccountRow, sqlx::Error> = sqlx::query_as(&format!(
            r#"
            INSERT INTO accounts (account_number, user_id, account_type, balance, status, opening_balance)
            VALUES ($1, $2, $3, $4, 'active', $4)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(account_number)
        .bind(user_id)
        .bind(account_type)
        .bind(opening_balance)
        .fetch_one(&self.pool)
        .await;

        match row {
            Ok(row) => Ok(account_from_row(row)),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505") => {
                Err(LedgerError::DuplicateAccountNumber(account_number.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Money movement
    // =========================================================================

    /// Apply a transfer inside the caller's transaction: debit the sender,
    /// credit the receiver, bump both `updated_at`, and insert the
    /// DEBIT/CREDIT pair sharing one transaction id. `NOW()` is stable for
    /// the duration of the transaction, so all four rows carry the same
    /// timestamp. Returns the pair's creation time.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_transfer(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        transaction_id: Uuid,
        acting_user_id: Uuid,
        sender_account_id: Uuid,
        receiver_account_id: Uuid,
        amount: &Amount,
        description: &str,
    ) -> Result<DateTime<Utc>, LedgerError> {
        sqlx::query(
            "UPDATE accounts SET balance = balance - $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(sender_account_id)
        .bind(amount.value())
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            "UPDATE accounts SET balance = balance + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(receiver_account_id)
        .bind(amount.value())
        .execute(&mut **tx)
        .await?;

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO transactions (
                transaction_id, sender_id, sender_account_id, receiver_account_id,
                amount, transaction_type, description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING created_at
            "#,
        )
        .bind(transaction_id)
        .bind(acting_user_id)
        .bind(sender_account_id)
        .bind(receiver_account_id)
        .bind(amount.value())
        .bind(TransactionType::Debit)
        .bind(description)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO transactions (
                transaction_id, sender_id, sender_account_id, receiver_account_id,
                amount, transaction_type, description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(transaction_id)
        .bind(acting_user_id)
        .bind(sender_account_id)
        .bind(receiver_account_id)
        .bind(amount.value())
        .bind(TransactionType::Credit)
        .bind(description)
        .execute(&mut **tx)
        .await?;

        Ok(created_at)
    }

    // =========================================================================
    // Status transitions
    // =========================================================================

    /// Single-statement status transition, validated against the persisted
    /// status at commit time. Returns the account number on success, `None`
    /// when the precondition no longer holds (caller re-reads to diagnose).
    pub async fn transition_status(
        &self,
        account_id: Uuid,
        expected: AccountStatus,
        next: AccountStatus,
    ) -> Result<Option<String>, LedgerError> {
        let account_number: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE accounts
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING account_number
            "#,
        )
        .bind(account_id)
        .bind(expected)
        .bind(next)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account_number)
    }

    /// Close an account: allowed from ACTIVE or FROZEN, only with an exactly
    /// zero balance. Same commit-time validation as `transition_status`.
    pub async fn close_account(&self, account_id: Uuid) -> Result<Option<String>, LedgerError> {
        let account_number: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE accounts
            SET status = 'closed', updated_at = NOW()
            WHERE id = $1 AND status <> 'closed' AND balance = 0
            RETURNING account_number
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account_number)
    }

    // =========================================================================
    // Transaction queries
    // =========================================================================

    /// Both rows of a transfer pair, credit first
    pub async fn get_transaction_pair(
        &self,
        transaction_id: Uuid,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT t.transaction_id, t.sender_id, sa.account_number, ra.account_number,
                   t.amount, t.transaction_type, t.description, t.created_at
            FROM transactions t
            JOIN accounts sa ON sa.id = t.sender_account_id
            JOIN accounts ra ON ra.id = t.receiver_account_id
            WHERE t.transaction_id = $1
            ORDER BY t.transaction_type ASC
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(transaction_from_row).collect())
    }

    /// The accounts involved in a transfer, for access checks
    pub async fn get_transaction_participants(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<(Uuid, Uuid)>, LedgerError> {
        let row: Option<(Uuid, Uuid)> = sqlx::query_as(
            r#"
            SELECT sender_account_id, receiver_account_id
            FROM transactions
            WHERE transaction_id = $1
            LIMIT 1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Transaction history from one account's perspective: DEBIT rows where
    /// it sent, CREDIT rows where it received. Each transfer therefore shows
    /// up exactly once, newest first.
    pub async fn account_history(
        &self,
        account_id: Uuid,
        filter: &HistoryFilter,
    ) -> Result<(Vec<TransactionRecord>, i64), LedgerError> {
        const PERSPECTIVE: &str = "((t.sender_account_id = $1 AND t.transaction_type = 'debit')
                OR (t.receiver_account_id = $1 AND t.transaction_type = 'credit'))
              AND ($2::timestamptz IS NULL OR t.created_at >= $2)
              AND ($3::timestamptz IS NULL OR t.created_at <= $3)
              AND ($4::text IS NULL OR t.transaction_type = $4)
              AND ($5::numeric IS NULL OR t.amount >= $5)
              AND ($6::numeric IS NULL OR t.amount <= $6)";

        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            r#"
            SELECT t.transaction_id, t.sender_id, sa.account_number, ra.account_number,
                   t.amount, t.transaction_type, t.description, t.created_at
            FROM transactions t
            JOIN accounts sa ON sa.id = t.sender_account_id
            JOIN accounts ra ON ra.id = t.receiver_account_id
            WHERE {PERSPECTIVE}
            ORDER BY t.created_at DESC, t.id DESC
            LIMIT $7 OFFSET $8
            "#
        ))
        .bind(account_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.transaction_type.map(|t| t.as_str()))
        .bind(filter.min_amount)
        .bind(filter.max_amount)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM transactions t WHERE {PERSPECTIVE}"
        ))
        .bind(account_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.transaction_type.map(|t| t.as_str()))
        .bind(filter.min_amount)
        .bind(filter.max_amount)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows.into_iter().map(transaction_from_row).collect(), total))
    }

    /// All transactions across all accounts (privileged roles), newest first
    pub async fn all_transactions(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TransactionRecord>, i64), LedgerError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT t.transaction_id, t.sender_id, sa.account_number, ra.account_number,
                   t.amount, t.transaction_type, t.description, t.created_at
            FROM transactions t
            JOIN accounts sa ON sa.id = t.sender_account_id
            JOIN accounts ra ON ra.id = t.receiver_account_id
            ORDER BY t.created_at DESC, t.id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok((rows.into_iter().map(transaction_from_row).collect(), total))
    }

    /// Sum of all account balances, used by conservation checks
    pub async fn total_balance(&self) -> Result<Decimal, LedgerError> {
        let total: Option<Decimal> = sqlx::query_scalar("SELECT SUM(balance) FROM accounts")
            .fetch_one(&self.pool)
            .await?;

        Ok(total.unwrap_or(Decimal::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_account_number_format() {
        for _ in 0..100 {
            let number = LedgerRepository::draw_account_number();
            assert_eq!(number.len(), 14);
            assert!(number.starts_with("ACC-"));
            assert!(number[4..].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_history_filter_default_is_unfiltered() {
        let filter = HistoryFilter::page(5, 0);
        assert!(filter.start_date.is_none());
        assert!(filter.end_date.is_none());
        assert!(filter.transaction_type.is_none());
        assert!(filter.min_amount.is_none());
        assert!(filter.max_amount.is_none());
        assert_eq!(filter.limit, 5);
    }
}
