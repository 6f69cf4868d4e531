//! Transfer Engine integration tests
//!
//! Conservation, atomicity, pairing and the suspicious-activity audit
//! contract, exercised against a live database.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    middleware,
};
use rust_decimal_macros::dec;
use serde_json::Value;
use tower::util::ServiceExt;
use uuid::Uuid;

use bankops::domain::{AccountType, DomainError, OperationContext};
use bankops::handlers::{ExternalTransferCommand, InternalTransferCommand, TransferHandler};
use bankops::AppError;

mod common;

#[tokio::test]
async fn test_internal_transfer_moves_funds_and_records_pair() {
    let pool = common::setup_test_db().await;
    let owner = common::seed_user(&pool, "alice", "customer").await;
    let checking = common::seed_account(&pool, owner, AccountType::Checking, "1000.00").await;
    let savings = common::seed_account(&pool, owner, AccountType::Savings, "500.00").await;

    let handler = TransferHandler::new(pool.clone());
    let context = OperationContext::new().with_acting_user(owner);

    let command = InternalTransferCommand::new(owner, checking.id, savings.id, "200.00".to_string());
    let result = handler.internal(command, &context).await.unwrap();

    assert_eq!(result.amount, dec!(200.00));
    assert_eq!(result.sender_account, checking.account_number);
    assert_eq!(result.receiver_account, savings.account_number);

    assert_eq!(common::balance_of(&pool, checking.id).await, dec!(800.00));
    assert_eq!(common::balance_of(&pool, savings.id).await, dec!(700.00));

    // Exactly one DEBIT and one CREDIT row sharing the transaction id
    let rows: Vec<(String, rust_decimal::Decimal, Uuid, Uuid)> = sqlx::query_as(
        "SELECT transaction_type, amount, sender_account_id, receiver_account_id
         FROM transactions WHERE transaction_id = $1 ORDER BY transaction_type",
    )
    .bind(result.transaction_id)
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, "credit");
    assert_eq!(rows[1].0, "debit");
    for (_, amount, sender_account_id, receiver_account_id) in &rows {
        assert_eq!(*amount, dec!(200.00));
        assert_eq!(*sender_account_id, checking.id);
        assert_eq!(*receiver_account_id, savings.id);
    }

    // Both rows carry the same timestamp
    let distinct_timestamps: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT created_at) FROM transactions WHERE transaction_id = $1",
    )
    .bind(result.transaction_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(distinct_timestamps, 1);

    // A transfer audit entry references the transaction
    let audit_ref: Option<String> = sqlx::query_scalar(
        "SELECT resource_id FROM audit_logs WHERE action = 'transfer' ORDER BY id DESC LIMIT 1",
    )
    .fetch_optional(&pool)
    .await
    .unwrap();
    assert_eq!(audit_ref, Some(result.transaction_id.to_string()));
}

#[tokio::test]
async fn test_insufficient_balance_changes_nothing_and_flags_suspicious() {
    let pool = common::setup_test_db().await;
    let owner = common::seed_user(&pool, "alice", "customer").await;
    let checking = common::seed_account(&pool, owner, AccountType::Checking, "1000.00").await;
    let savings = common::seed_account(&pool, owner, AccountType::Savings, "500.00").await;

    let handler = TransferHandler::new(pool.clone());
    let context = OperationContext::new().with_acting_user(owner);

    let command =
        InternalTransferCommand::new(owner, checking.id, savings.id, "2000.00".to_string());
    let result = handler.internal(command, &context).await;

    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::InsufficientBalance { .. }))
    ));

    // Byte-for-byte unchanged: balances and transaction table
    assert_eq!(common::balance_of(&pool, checking.id).await, dec!(1000.00));
    assert_eq!(common::balance_of(&pool, savings.id).await, dec!(500.00));
    let transactions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(transactions, 0);

    // Balance exhaustion attempts are tracked as abuse signals
    assert_eq!(common::audit_count(&pool, "suspicious_activity").await, 1);
}

#[tokio::test]
async fn test_ownership_violation_flags_suspicious() {
    let pool = common::setup_test_db().await;
    let alice = common::seed_user(&pool, "alice", "customer").await;
    let bob = common::seed_user(&pool, "bob", "customer").await;
    let alice_account = common::seed_account(&pool, alice, AccountType::Checking, "1000.00").await;
    let bob_account = common::seed_account(&pool, bob, AccountType::Checking, "500.00").await;

    let handler = TransferHandler::new(pool.clone());
    let context = OperationContext::new().with_acting_user(alice);

    let command =
        InternalTransferCommand::new(alice, alice_account.id, bob_account.id, "100.00".to_string());
    let result = handler.internal(command, &context).await;

    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::OwnershipViolation))
    ));
    assert_eq!(common::balance_of(&pool, alice_account.id).await, dec!(1000.00));
    assert_eq!(common::balance_of(&pool, bob_account.id).await, dec!(500.00));
    assert_eq!(common::audit_count(&pool, "suspicious_activity").await, 1);
}

#[tokio::test]
async fn test_frozen_account_blocks_both_sides() {
    let pool = common::setup_test_db().await;
    let owner = common::seed_user(&pool, "alice", "customer").await;
    let frozen = common::seed_account(&pool, owner, AccountType::Checking, "1000.00").await;
    let active = common::seed_account(&pool, owner, AccountType::Savings, "500.00").await;

    sqlx::query("UPDATE accounts SET status = 'frozen' WHERE id = $1")
        .bind(frozen.id)
        .execute(&pool)
        .await
        .unwrap();

    let handler = TransferHandler::new(pool.clone());
    let context = OperationContext::new().with_acting_user(owner);

    // Frozen sender
    let command = InternalTransferCommand::new(owner, frozen.id, active.id, "100.00".to_string());
    let result = handler.internal(command, &context).await;
    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::InactiveAccount { side: "Sender" }))
    ));

    // Frozen receiver
    let command = InternalTransferCommand::new(owner, active.id, frozen.id, "100.00".to_string());
    let result = handler.internal(command, &context).await;
    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::InactiveAccount { side: "Receiver" }))
    ));

    assert_eq!(common::balance_of(&pool, frozen.id).await, dec!(1000.00));
    assert_eq!(common::balance_of(&pool, active.id).await, dec!(500.00));
}

#[tokio::test]
async fn test_same_account_transfer_rejected() {
    let pool = common::setup_test_db().await;
    let owner = common::seed_user(&pool, "alice", "customer").await;
    let account = common::seed_account(&pool, owner, AccountType::Checking, "1000.00").await;

    let handler = TransferHandler::new(pool.clone());
    let context = OperationContext::new().with_acting_user(owner);

    let command = InternalTransferCommand::new(owner, account.id, account.id, "100.00".to_string());
    let result = handler.internal(command, &context).await;

    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::SameAccountTransfer))
    ));
    assert_eq!(common::balance_of(&pool, account.id).await, dec!(1000.00));
}

#[tokio::test]
async fn test_invalid_amount_fails_before_any_lookup() {
    let pool = common::setup_test_db().await;
    let owner = common::seed_user(&pool, "alice", "customer").await;
    let account = common::seed_account(&pool, owner, AccountType::Checking, "1000.00").await;

    let handler = TransferHandler::new(pool.clone());
    let context = OperationContext::new().with_acting_user(owner);

    for amount in ["0", "-5.00", "1.001", "not-a-number"] {
        let command =
            InternalTransferCommand::new(owner, account.id, Uuid::new_v4(), amount.to_string());
        let result = handler.internal(command, &context).await;
        assert!(
            matches!(result, Err(AppError::Domain(DomainError::InvalidAmount(_)))),
            "amount {} should be rejected as invalid",
            amount
        );
    }
}

#[tokio::test]
async fn test_missing_account_reported_not_found() {
    let pool = common::setup_test_db().await;
    let owner = common::seed_user(&pool, "alice", "customer").await;
    let account = common::seed_account(&pool, owner, AccountType::Checking, "1000.00").await;

    let handler = TransferHandler::new(pool.clone());
    let context = OperationContext::new().with_acting_user(owner);

    let missing = Uuid::new_v4();
    let command = InternalTransferCommand::new(owner, account.id, missing, "100.00".to_string());
    let result = handler.internal(command, &context).await;

    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::AccountNotFound(_)))
    ));
    // Not-found is ordinary validation, not a security signal
    assert_eq!(common::audit_count(&pool, "suspicious_activity").await, 0);
}

#[tokio::test]
async fn test_external_transfer_crosses_owners() {
    let pool = common::setup_test_db().await;
    let alice = common::seed_user(&pool, "alice", "customer").await;
    let bob = common::seed_user(&pool, "bob", "customer").await;
    let alice_account = common::seed_account(&pool, alice, AccountType::Checking, "1000.00").await;
    let bob_account = common::seed_account(&pool, bob, AccountType::Savings, "500.00").await;

    let handler = TransferHandler::new(pool.clone());
    let context = OperationContext::new().with_acting_user(alice);

    let command = ExternalTransferCommand::new(
        alice,
        alice_account.id,
        bob_account.account_number.clone(),
        "250.00".to_string(),
    )
    .with_description("Invoice 42".to_string());
    let result = handler.external(command, &context).await.unwrap();

    assert_eq!(common::balance_of(&pool, alice_account.id).await, dec!(750.00));
    assert_eq!(common::balance_of(&pool, bob_account.id).await, dec!(750.00));
    assert_eq!(
        common::transaction_pair_count(&pool, result.transaction_id).await,
        2
    );

    // sender_id records the acting user even though the receiver is Bob's
    let sender_id: Uuid = sqlx::query_scalar(
        "SELECT sender_id FROM transactions WHERE transaction_id = $1 LIMIT 1",
    )
    .bind(result.transaction_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(sender_id, alice);
}

#[tokio::test]
async fn test_external_transfer_probing_unknown_number_flags_suspicious() {
    let pool = common::setup_test_db().await;
    let alice = common::seed_user(&pool, "alice", "customer").await;
    let alice_account = common::seed_account(&pool, alice, AccountType::Checking, "1000.00").await;

    let handler = TransferHandler::new(pool.clone());
    let context = OperationContext::new().with_acting_user(alice);

    let command = ExternalTransferCommand::new(
        alice,
        alice_account.id,
        "ACC-9999999999".to_string(),
        "100.00".to_string(),
    );
    let result = handler.external(command, &context).await;

    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::ReceiverNotFound(_)))
    ));
    assert_eq!(common::balance_of(&pool, alice_account.id).await, dec!(1000.00));
    assert_eq!(common::audit_count(&pool, "suspicious_activity").await, 1);
}

#[tokio::test]
async fn test_concurrent_transfers_conserve_total() {
    let pool = common::setup_test_db().await;
    let owner = common::seed_user(&pool, "alice", "customer").await;
    let sender = common::seed_account(&pool, owner, AccountType::Checking, "1000.00").await;
    let receiver_a = common::seed_account(&pool, owner, AccountType::Savings, "0.00").await;
    let receiver_b = common::seed_account(&pool, owner, AccountType::Savings, "0.00").await;

    let handler = Arc::new(TransferHandler::new(pool.clone()));
    let context = OperationContext::new().with_acting_user(owner);

    // Three concurrent 400.00 debits against a 1000.00 balance: at most two
    // can pass the balance check, and no stale read may let a third through.
    let mut tasks = Vec::new();
    for receiver_id in [receiver_a.id, receiver_b.id, receiver_a.id] {
        let handler = Arc::clone(&handler);
        let context = context.clone();
        let sender_id = sender.id;
        tasks.push(tokio::spawn(async move {
            let command = InternalTransferCommand::new(
                context.acting_user_id.unwrap(),
                sender_id,
                receiver_id,
                "400.00".to_string(),
            );
            handler.internal(command, &context).await
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert!(successes <= 2, "at most two 400.00 debits can fit in 1000.00");

    let total = common::balance_of(&pool, sender.id).await
        + common::balance_of(&pool, receiver_a.id).await
        + common::balance_of(&pool, receiver_b.id).await;
    assert_eq!(total, dec!(1000.00), "conservation invariant violated");

    // Sender balance reflects exactly the successful debits
    assert_eq!(
        common::balance_of(&pool, sender.id).await,
        dec!(1000.00) - dec!(400.00) * rust_decimal::Decimal::from(successes)
    );
}

#[tokio::test]
async fn test_transfer_e2e() {
    let pool = common::setup_test_db().await;
    let owner = common::seed_user(&pool, "alice", "customer").await;
    let checking = common::seed_account(&pool, owner, AccountType::Checking, "1000.00").await;
    let savings = common::seed_account(&pool, owner, AccountType::Savings, "500.00").await;

    let app = bankops::api::create_router()
        .layer(middleware::from_fn_with_state(
            pool.clone(),
            bankops::api::middleware::auth_middleware,
        ))
        .with_state(pool.clone());

    // Transfer via the HTTP surface
    let req = Request::builder()
        .method("POST")
        .uri("/transfers/internal")
        .header("content-type", "application/json")
        .header("X-API-Key", common::TEST_API_KEY)
        .header("X-Acting-User-Id", owner.to_string())
        .body(Body::from(
            serde_json::json!({
                "sender_account_id": checking.id,
                "receiver_account_id": savings.id,
                "amount": "200.00",
                "description": "Savings top-up"
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK, "Transfer failed");

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["sender_account"], checking.account_number.as_str());
    assert_eq!(json["amount"], "200.00");

    // Verify balance through the API as well
    let req = Request::builder()
        .method("GET")
        .uri(format!("/accounts/{}/balance", checking.id))
        .header("X-API-Key", common::TEST_API_KEY)
        .header("X-Acting-User-Id", owner.to_string())
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["balance"], "800.00");

    // Support agents may not move money: permission matrix enforced at the boundary
    let agent = common::seed_user(&pool, "agent", "support_agent").await;
    let req = Request::builder()
        .method("POST")
        .uri("/transfers/internal")
        .header("content-type", "application/json")
        .header("X-API-Key", common::TEST_API_KEY)
        .header("X-Acting-User-Id", agent.to_string())
        .body(Body::from(
            serde_json::json!({
                "sender_account_id": checking.id,
                "receiver_account_id": savings.id,
                "amount": "1.00"
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_transaction_history_perspective() {
    let pool = common::setup_test_db().await;
    let owner = common::seed_user(&pool, "alice", "customer").await;
    let checking = common::seed_account(&pool, owner, AccountType::Checking, "1000.00").await;
    let savings = common::seed_account(&pool, owner, AccountType::Savings, "0.00").await;

    let handler = TransferHandler::new(pool.clone());
    let context = OperationContext::new().with_acting_user(owner);

    for amount in ["10.00", "20.00", "30.00"] {
        let command =
            InternalTransferCommand::new(owner, checking.id, savings.id, amount.to_string());
        handler.internal(command, &context).await.unwrap();
    }

    let ledger = bankops::ledger::LedgerRepository::new(pool.clone());

    // Sender sees three DEBIT rows, newest first
    let (history, total) = ledger
        .account_history(checking.id, &bankops::ledger::HistoryFilter::page(10, 0))
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(history.len(), 3);
    assert!(history
        .iter()
        .all(|t| t.transaction_type == bankops::domain::TransactionType::Debit));
    assert_eq!(history[0].amount, dec!(30.00));

    // Receiver sees the same transfers as CREDIT rows
    let (history, total) = ledger
        .account_history(savings.id, &bankops::ledger::HistoryFilter::page(10, 0))
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert!(history
        .iter()
        .all(|t| t.transaction_type == bankops::domain::TransactionType::Credit));

    // Amount filter narrows the view
    let filter = bankops::ledger::HistoryFilter {
        min_amount: Some(dec!(20.00)),
        ..bankops::ledger::HistoryFilter::page(10, 0)
    };
    let (history, total) = ledger.account_history(checking.id, &filter).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(history.len(), 2);
}
