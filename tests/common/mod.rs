//! Common test utilities

#![allow(dead_code)]

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use bankops::domain::AccountType;
use bankops::ledger::{AccountRecord, LedgerRepository};

/// API key the middleware accepts in tests
pub const TEST_API_KEY: &str = "test_key_123";

/// Setup test database - truncate tables and seed a service API key
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    // Compute hash dynamically to match what the middleware expects
    let hash_check: String =
        sqlx::query_scalar("SELECT encode(sha256($1::bytea), 'hex')")
            .bind(TEST_API_KEY.as_bytes())
            .fetch_one(&pool)
            .await
            .unwrap();

    let mut tx = pool.begin().await.expect("Failed to begin transaction");

    // Clean up DB for fresh state
    sqlx::query("TRUNCATE TABLE audit_logs, transactions, accounts, users, api_keys CASCADE")
        .execute(&mut *tx)
        .await
        .expect("Failed to clean up DB");

    // Seed test API key with dynamically computed hash
    sqlx::query(
        r#"
        INSERT INTO api_keys (id, name, key_hash, key_prefix, permissions, is_active)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (key_prefix) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind("Test Key")
    .bind(&hash_check)
    .bind("test_")
    .bind(vec!["admin".to_string()])
    .bind(true)
    .execute(&mut *tx)
    .await
    .expect("Failed to seed API key");

    tx.commit().await.expect("Failed to commit transaction");

    pool
}

/// Insert a user with the given role and return its id
pub async fn seed_user(pool: &PgPool, username: &str, role: &str) -> Uuid {
    let user_id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO users (id, username, email, full_name, role, is_active)
        VALUES ($1, $2, $3, $4, $5, true)
        "#,
    )
    .bind(user_id)
    .bind(username)
    .bind(format!("{}@example.com", username))
    .bind(format!("Test {}", username))
    .bind(role)
    .execute(pool)
    .await
    .expect("Failed to seed user");

    user_id
}

/// Insert an account with a fresh number and the given balance
pub async fn seed_account(
    pool: &PgPool,
    user_id: Uuid,
    account_type: AccountType,
    balance: &str,
) -> AccountRecord {
    let ledger = LedgerRepository::new(pool.clone());
    let number = ledger
        .generate_account_number()
        .await
        .expect("Failed to allocate account number");

    ledger
        .insert_account(
            user_id,
            &number,
            account_type,
            balance.parse::<Decimal>().expect("Invalid test balance"),
        )
        .await
        .expect("Failed to seed account")
}

/// Current balance of an account
pub async fn balance_of(pool: &PgPool, account_id: Uuid) -> Decimal {
    sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1")
        .bind(account_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read balance")
}

/// Number of audit rows with the given action
pub async fn audit_count(pool: &PgPool, action: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs WHERE action = $1")
        .bind(action)
        .fetch_one(pool)
        .await
        .expect("Failed to count audit rows")
}

/// Number of transaction rows sharing the given transaction id
pub async fn transaction_pair_count(pool: &PgPool, transaction_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE transaction_id = $1")
        .bind(transaction_id)
        .fetch_one(pool)
        .await
        .expect("Failed to count transaction rows")
}
