//! API Routes
//!
//! HTTP endpoint definitions. Handlers parse and authorize at this
//! boundary, then delegate to the command handlers; no transport types
//! leak below this module.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLogEntry, AuditLogService, ChainVerificationResult};
use crate::domain::{AccountStatus, AccountType, DomainError, OperationContext, TransactionType, UserRole};
use crate::error::AppError;
use crate::handlers::{
    CloseAccountHandler, CreateAccountCommand, CreateAccountHandler, ExternalTransferCommand,
    FreezeAccountHandler, InternalTransferCommand, TransferHandler, UnfreezeAccountHandler,
};
use crate::ledger::{HistoryFilter, LedgerRepository, TransactionRecord};
use crate::rbac::{self, Permission, RbacService};

use super::middleware::ActingUser;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    /// Defaults to the acting user; admins may create on behalf of others
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub account_type: String,
    #[serde(default)]
    pub opening_balance: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccountCreatedResponse {
    pub account_id: Uuid,
    pub account_number: String,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub account_id: Uuid,
    pub account_number: String,
    pub user_id: Uuid,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub opening_balance: Decimal,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: Uuid,
    pub account_number: String,
    pub balance: Decimal,
    pub status: AccountStatus,
}

#[derive(Debug, Deserialize)]
pub struct InternalTransferRequest {
    pub sender_account_id: Uuid,
    pub receiver_account_id: Uuid,
    pub amount: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExternalTransferRequest {
    pub sender_account_id: Uuid,
    pub receiver_account_number: String,
    pub amount: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub transaction_id: Uuid,
    pub sender_account: String,
    pub receiver_account: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaction_id: Uuid,
    pub sender_account: String,
    pub receiver_account: String,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<TransactionRecord> for TransactionResponse {
    fn from(record: TransactionRecord) -> Self {
        Self {
            transaction_id: record.transaction_id,
            sender_account: record.sender_account,
            receiver_account: record.receiver_account,
            amount: record.amount,
            transaction_type: record.transaction_type,
            description: record.description,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionsListResponse {
    pub transactions: Vec<TransactionResponse>,
    pub total_count: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct TransactionPairResponse {
    pub transaction_id: Uuid,
    pub records: Vec<TransactionResponse>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(default)]
    pub min_amount: Option<Decimal>,
    #[serde(default)]
    pub max_amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct StatusChangeResponse {
    pub account_id: Uuid,
    pub account_number: String,
    pub status: AccountStatus,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct AssignRoleResponse {
    pub user_id: Uuid,
    pub username: String,
    pub old_role: UserRole,
    pub new_role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct UsersByRoleQuery {
    pub role: String,
    #[serde(default = "default_users_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_users_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default = "default_audit_limit")]
    pub limit: i64,
}

fn default_audit_limit() -> i64 {
    100
}

#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
    pub user_id: Uuid,
    pub role: UserRole,
    pub permissions: Vec<Permission>,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<PgPool> {
    Router::new()
        // Accounts
        .route("/accounts", post(create_account).get(list_own_accounts))
        .route("/accounts/:account_id", get(get_account))
        .route("/accounts/:account_id/balance", get(get_account_balance))
        .route("/accounts/:account_id/transactions", get(get_account_transactions))
        .route("/users/:user_id/accounts", get(list_user_accounts))
        .route("/users/:user_id/permissions", get(get_user_permissions))
        // Transfers
        .route("/transfers/internal", post(internal_transfer))
        .route("/transfers/external", post(external_transfer))
        .route("/transactions", get(get_all_transactions))
        .route("/transactions/:transaction_id", get(get_transaction))
        // Admin: account lifecycle
        .route("/admin/accounts/:account_id/freeze", post(freeze_account))
        .route("/admin/accounts/:account_id/unfreeze", post(unfreeze_account))
        .route("/admin/accounts/:account_id/close", post(close_account))
        // Admin: users and roles
        .route("/admin/users", get(get_users_by_role))
        .route("/admin/users/:user_id/role", put(assign_role))
        .route("/admin/users/:user_id/activate", post(activate_user))
        .route("/admin/users/:user_id/deactivate", post(deactivate_user))
        // Admin: audit trail
        .route("/admin/audit", get(get_audit_logs))
        .route("/admin/audit/verify", get(verify_audit_chain))
}

/// The acting user is mandatory on every endpoint that authorizes by role
fn acting(user: Option<Extension<ActingUser>>) -> Result<ActingUser, AppError> {
    user.map(|Extension(user)| user)
        .ok_or_else(|| AppError::MissingHeader("X-Acting-User-Id".to_string()))
}

/// Consult the permission matrix
fn require(user: &ActingUser, permission: Permission) -> Result<(), AppError> {
    if rbac::has_permission(user.role, permission) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}

// =========================================================================
// POST /accounts
// =========================================================================

/// Open a new account, self-service or admin-on-behalf-of
async fn create_account(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    acting_user: Option<Extension<ActingUser>>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountCreatedResponse>), AppError> {
    let user = acting(acting_user)?;
    require(&user, Permission::CreateAccounts)?;

    let target_user_id = request.user_id.unwrap_or(user.id);
    if target_user_id != user.id && user.role != UserRole::Admin {
        return Err(AppError::PermissionDenied);
    }

    let handler = CreateAccountHandler::new(pool);

    let command = CreateAccountCommand::new(
        target_user_id,
        request.account_type,
        request.opening_balance.unwrap_or_else(|| "0".to_string()),
    );

    let result = handler.execute(command, &context).await?;

    Ok((
        StatusCode::CREATED,
        Json(AccountCreatedResponse {
            account_id: result.account_id,
            account_number: result.account_number,
            account_type: result.account_type,
            balance: result.balance,
            status: result.status,
            created_at: result.created_at,
        }),
    ))
}

// =========================================================================
// GET /accounts
// =========================================================================

/// List the acting user's own accounts
async fn list_own_accounts(
    State(pool): State<PgPool>,
    acting_user: Option<Extension<ActingUser>>,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    let user = acting(acting_user)?;
    require(&user, Permission::ViewOwnAccounts)?;

    list_accounts_for(pool, user.id).await
}

// =========================================================================
// GET /users/:user_id/accounts
// =========================================================================

/// List another user's accounts (self, or a role that sees all accounts)
async fn list_user_accounts(
    State(pool): State<PgPool>,
    Path(user_id): Path<Uuid>,
    acting_user: Option<Extension<ActingUser>>,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    let user = acting(acting_user)?;
    if user_id == user.id {
        require(&user, Permission::ViewOwnAccounts)?;
    } else {
        require(&user, Permission::ViewAllUserAccounts)?;
    }

    list_accounts_for(pool, user_id).await
}

async fn list_accounts_for(
    pool: PgPool,
    user_id: Uuid,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    let ledger = LedgerRepository::new(pool);

    let accounts = ledger.list_user_accounts(user_id).await?;

    Ok(Json(
        accounts
            .into_iter()
            .map(|a| AccountResponse {
                account_id: a.id,
                account_number: a.account_number,
                user_id: a.user_id,
                account_type: a.account_type,
                balance: a.balance,
                opening_balance: a.opening_balance,
                status: a.status,
                created_at: a.created_at,
                updated_at: a.updated_at,
            })
            .collect(),
    ))
}

// =========================================================================
// GET /accounts/:account_id
// =========================================================================

/// Get account details (owner, or a role that sees all accounts)
async fn get_account(
    State(pool): State<PgPool>,
    Path(account_id): Path<Uuid>,
    acting_user: Option<Extension<ActingUser>>,
) -> Result<Json<AccountResponse>, AppError> {
    let user = acting(acting_user)?;
    let ledger = LedgerRepository::new(pool);

    let account = ledger
        .get_account(account_id)
        .await?
        .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()))?;

    if account.user_id == user.id {
        require(&user, Permission::ViewOwnAccounts)?;
    } else {
        require(&user, Permission::ViewAllUserAccounts)?;
    }

    Ok(Json(AccountResponse {
        account_id: account.id,
        account_number: account.account_number,
        user_id: account.user_id,
        account_type: account.account_type,
        balance: account.balance,
        opening_balance: account.opening_balance,
        status: account.status,
        created_at: account.created_at,
        updated_at: account.updated_at,
    }))
}

// =========================================================================
// GET /accounts/:account_id/balance
// =========================================================================

/// Get current account balance
async fn get_account_balance(
    State(pool): State<PgPool>,
    Path(account_id): Path<Uuid>,
    acting_user: Option<Extension<ActingUser>>,
) -> Result<Json<BalanceResponse>, AppError> {
    let user = acting(acting_user)?;
    let ledger = LedgerRepository::new(pool);

    let account = ledger
        .get_account(account_id)
        .await?
        .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()))?;

    if account.user_id == user.id {
        require(&user, Permission::ViewOwnAccounts)?;
    } else {
        require(&user, Permission::ViewAllUserAccounts)?;
    }

    Ok(Json(BalanceResponse {
        account_id: account.id,
        account_number: account.account_number,
        balance: account.balance,
        status: account.status,
    }))
}

// =========================================================================
// GET /accounts/:account_id/transactions
// =========================================================================

/// Transaction history from the account's perspective, newest first,
/// with optional date/type/amount filters
async fn get_account_transactions(
    State(pool): State<PgPool>,
    Path(account_id): Path<Uuid>,
    acting_user: Option<Extension<ActingUser>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<TransactionsListResponse>, AppError> {
    let user = acting(acting_user)?;
    let ledger = LedgerRepository::new(pool);

    let account = ledger
        .get_account(account_id)
        .await?
        .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()))?;

    if account.user_id == user.id {
        require(&user, Permission::ViewOwnTransactions)?;
    } else {
        require(&user, Permission::ViewAllTransactions)?;
    }

    let transaction_type = query
        .transaction_type
        .as_deref()
        .map(TransactionType::from_str)
        .transpose()?;

    let filter = HistoryFilter {
        start_date: query.start_date,
        end_date: query.end_date,
        transaction_type,
        min_amount: query.min_amount,
        max_amount: query.max_amount,
        limit: query.limit.clamp(1, 100),
        offset: query.offset.max(0),
    };

    let (transactions, total_count) = ledger.account_history(account_id, &filter).await?;

    Ok(Json(TransactionsListResponse {
        transactions: transactions.into_iter().map(Into::into).collect(),
        total_count,
        limit: filter.limit,
        offset: filter.offset,
    }))
}

// =========================================================================
// POST /transfers/internal
// =========================================================================

/// Move money between two accounts of the acting user
async fn internal_transfer(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    acting_user: Option<Extension<ActingUser>>,
    Json(request): Json<InternalTransferRequest>,
) -> Result<Json<TransferResponse>, AppError> {
    let user = acting(acting_user)?;
    require(&user, Permission::InternalTransfers)?;

    let handler = TransferHandler::new(pool);

    let command = InternalTransferCommand::new(
        user.id,
        request.sender_account_id,
        request.receiver_account_id,
        request.amount,
    );
    let command = if let Some(description) = request.description {
        command.with_description(description)
    } else {
        command
    };

    let result = handler.internal(command, &context).await?;

    Ok(Json(TransferResponse {
        transaction_id: result.transaction_id,
        sender_account: result.sender_account,
        receiver_account: result.receiver_account,
        amount: result.amount,
        created_at: result.created_at,
    }))
}

// =========================================================================
// POST /transfers/external
// =========================================================================

/// Move money to an account identified by number, regardless of owner
async fn external_transfer(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    acting_user: Option<Extension<ActingUser>>,
    Json(request): Json<ExternalTransferRequest>,
) -> Result<Json<TransferResponse>, AppError> {
    let user = acting(acting_user)?;
    require(&user, Permission::ExternalTransfers)?;

    let handler = TransferHandler::new(pool);

    let command = ExternalTransferCommand::new(
        user.id,
        request.sender_account_id,
        request.receiver_account_number,
        request.amount,
    );
    let command = if let Some(description) = request.description {
        command.with_description(description)
    } else {
        command
    };

    let result = handler.external(command, &context).await?;

    Ok(Json(TransferResponse {
        transaction_id: result.transaction_id,
        sender_account: result.sender_account,
        receiver_account: result.receiver_account,
        amount: result.amount,
        created_at: result.created_at,
    }))
}

// =========================================================================
// GET /transactions
// =========================================================================

/// All transactions across all accounts (privileged roles)
async fn get_all_transactions(
    State(pool): State<PgPool>,
    acting_user: Option<Extension<ActingUser>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<TransactionsListResponse>, AppError> {
    let user = acting(acting_user)?;
    require(&user, Permission::ViewAllTransactions)?;

    let ledger = LedgerRepository::new(pool);

    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);
    let (transactions, total_count) = ledger.all_transactions(limit, offset).await?;

    Ok(Json(TransactionsListResponse {
        transactions: transactions.into_iter().map(Into::into).collect(),
        total_count,
        limit,
        offset,
    }))
}

// =========================================================================
// GET /transactions/:transaction_id
// =========================================================================

/// Both rows of a transfer pair
async fn get_transaction(
    State(pool): State<PgPool>,
    Path(transaction_id): Path<Uuid>,
    acting_user: Option<Extension<ActingUser>>,
) -> Result<Json<TransactionPairResponse>, AppError> {
    let user = acting(acting_user)?;
    let ledger = LedgerRepository::new(pool.clone());

    let participants = ledger
        .get_transaction_participants(transaction_id)
        .await?
        .ok_or_else(|| DomainError::TransactionNotFound(transaction_id.to_string()))?;

    if !rbac::has_permission(user.role, Permission::ViewAllTransactions) {
        require(&user, Permission::ViewOwnTransactions)?;

        let rbac_service = RbacService::new(pool);
        let (sender_account_id, receiver_account_id) = participants;
        let owns_side = rbac_service.is_owner(user.id, sender_account_id).await?
            || rbac_service.is_owner(user.id, receiver_account_id).await?;
        if !owns_side {
            return Err(AppError::PermissionDenied);
        }
    }

    let records = ledger.get_transaction_pair(transaction_id).await?;

    Ok(Json(TransactionPairResponse {
        transaction_id,
        records: records.into_iter().map(Into::into).collect(),
    }))
}

// =========================================================================
// POST /admin/accounts/:account_id/freeze
// =========================================================================

/// Freeze an account (admin only)
async fn freeze_account(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
    acting_user: Option<Extension<ActingUser>>,
) -> Result<Json<StatusChangeResponse>, AppError> {
    let user = acting(acting_user)?;
    require(&user, Permission::FreezeUnfreezeAccounts)?;

    let handler = FreezeAccountHandler::new(pool);
    let result = handler.execute(account_id, &context).await?;

    Ok(Json(StatusChangeResponse {
        account_id: result.account_id,
        account_number: result.account_number,
        status: result.status,
    }))
}

// =========================================================================
// POST /admin/accounts/:account_id/unfreeze
// =========================================================================

/// Unfreeze an account (admin only)
async fn unfreeze_account(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
    acting_user: Option<Extension<ActingUser>>,
) -> Result<Json<StatusChangeResponse>, AppError> {
    let user = acting(acting_user)?;
    require(&user, Permission::FreezeUnfreezeAccounts)?;

    let handler = UnfreezeAccountHandler::new(pool);
    let result = handler.execute(account_id, &context).await?;

    Ok(Json(StatusChangeResponse {
        account_id: result.account_id,
        account_number: result.account_number,
        status: result.status,
    }))
}

// =========================================================================
// POST /admin/accounts/:account_id/close
// =========================================================================

/// Close an account with a zero balance (admin only)
async fn close_account(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
    acting_user: Option<Extension<ActingUser>>,
) -> Result<Json<StatusChangeResponse>, AppError> {
    let user = acting(acting_user)?;
    require(&user, Permission::FreezeUnfreezeAccounts)?;

    let handler = CloseAccountHandler::new(pool);
    let result = handler.execute(account_id, &context).await?;

    Ok(Json(StatusChangeResponse {
        account_id: result.account_id,
        account_number: result.account_number,
        status: result.status,
    }))
}

// =========================================================================
// GET /admin/users
// =========================================================================

/// List users by role (admin only)
async fn get_users_by_role(
    State(pool): State<PgPool>,
    acting_user: Option<Extension<ActingUser>>,
    Query(query): Query<UsersByRoleQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = acting(acting_user)?;
    require(&user, Permission::AssignChangeUserRoles)?;

    let rbac_service = RbacService::new(pool);
    let limit = query.limit.clamp(1, 200);
    let offset = query.offset.max(0);
    let (users, total_count) = rbac_service
        .users_by_role(&query.role, limit, offset)
        .await?;

    Ok(Json(serde_json::json!({
        "role": query.role,
        "users": users,
        "total_count": total_count,
        "limit": limit,
        "offset": offset,
    })))
}

// =========================================================================
// PUT /admin/users/:user_id/role
// =========================================================================

/// Reassign a user's role (admin only, audited)
async fn assign_role(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Path(user_id): Path<Uuid>,
    acting_user: Option<Extension<ActingUser>>,
    Json(request): Json<AssignRoleRequest>,
) -> Result<Json<AssignRoleResponse>, AppError> {
    let user = acting(acting_user)?;
    require(&user, Permission::AssignChangeUserRoles)?;

    let rbac_service = RbacService::new(pool);
    let result = rbac_service
        .assign_role(user_id, &request.role, &context)
        .await?;

    Ok(Json(AssignRoleResponse {
        user_id: result.user_id,
        username: result.username,
        old_role: result.old_role,
        new_role: result.new_role,
    }))
}

// =========================================================================
// POST /admin/users/:user_id/activate | /deactivate
// =========================================================================

/// Reactivate a user (admin only, audited)
async fn activate_user(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Path(user_id): Path<Uuid>,
    acting_user: Option<Extension<ActingUser>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = acting(acting_user)?;
    require(&user, Permission::AssignChangeUserRoles)?;

    let rbac_service = RbacService::new(pool);
    let result = rbac_service.activate_user(user_id, &context).await?;

    Ok(Json(serde_json::json!({
        "user_id": result.id,
        "username": result.username,
        "is_active": result.is_active,
    })))
}

/// Deactivate a user (admin only, audited)
async fn deactivate_user(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Path(user_id): Path<Uuid>,
    acting_user: Option<Extension<ActingUser>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = acting(acting_user)?;
    require(&user, Permission::AssignChangeUserRoles)?;

    let rbac_service = RbacService::new(pool);
    let result = rbac_service.deactivate_user(user_id, &context).await?;

    Ok(Json(serde_json::json!({
        "user_id": result.id,
        "username": result.username,
        "is_active": result.is_active,
    })))
}

// =========================================================================
// GET /users/:user_id/permissions
// =========================================================================

/// A user's role and full permission set (self, or admin)
async fn get_user_permissions(
    State(pool): State<PgPool>,
    Path(user_id): Path<Uuid>,
    acting_user: Option<Extension<ActingUser>>,
) -> Result<Json<PermissionsResponse>, AppError> {
    let user = acting(acting_user)?;
    if user_id != user.id {
        require(&user, Permission::AssignChangeUserRoles)?;
    }

    let rbac_service = RbacService::new(pool);
    let (role, permissions) = rbac_service.get_user_permissions(user_id).await?;

    Ok(Json(PermissionsResponse {
        user_id,
        role,
        permissions,
    }))
}

// =========================================================================
// GET /admin/audit
// =========================================================================

/// Query the audit trail (auditor/admin)
async fn get_audit_logs(
    State(pool): State<PgPool>,
    acting_user: Option<Extension<ActingUser>>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    let user = acting(acting_user)?;
    require(&user, Permission::ViewAuditSecurityLogs)?;

    let audit = AuditLogService::new(pool);
    let limit = query.limit.clamp(1, 1000);

    let entries = if let Some(user_id) = query.user_id {
        audit.get_by_user(user_id, limit).await?
    } else if let Some(ref action) = query.action {
        let action = AuditAction::from_str(action)?;
        audit.get_by_action(action, limit).await?
    } else {
        audit.get_recent(limit).await?
    };

    Ok(Json(entries))
}

// =========================================================================
// GET /admin/audit/verify
// =========================================================================

/// Re-verify the audit log hash chain (auditor/admin)
async fn verify_audit_chain(
    State(pool): State<PgPool>,
    acting_user: Option<Extension<ActingUser>>,
) -> Result<Json<ChainVerificationResult>, AppError> {
    let user = acting(acting_user)?;
    require(&user, Permission::ViewAuditSecurityLogs)?;

    let audit = AuditLogService::new(pool);
    let result = audit.verify_hash_chain(None).await?;

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_account_request_deserialize() {
        let json = r#"{
            "account_type": "checking",
            "opening_balance": "1000.00"
        }"#;

        let request: CreateAccountRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.account_type, "checking");
        assert_eq!(request.opening_balance, Some("1000.00".to_string()));
        assert!(request.user_id.is_none());
    }

    #[test]
    fn test_internal_transfer_request_deserialize() {
        let json = r#"{
            "sender_account_id": "550e8400-e29b-41d4-a716-446655440001",
            "receiver_account_id": "550e8400-e29b-41d4-a716-446655440002",
            "amount": "200.00",
            "description": "Savings top-up"
        }"#;

        let request: InternalTransferRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.amount, "200.00");
        assert_eq!(request.description, Some("Savings top-up".to_string()));
    }

    #[test]
    fn test_external_transfer_request_deserialize() {
        let json = r#"{
            "sender_account_id": "550e8400-e29b-41d4-a716-446655440001",
            "receiver_account_number": "ACC-0123456789",
            "amount": "75.50"
        }"#;

        let request: ExternalTransferRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.receiver_account_number, "ACC-0123456789");
        assert!(request.description.is_none());
    }

    #[test]
    fn test_history_query_defaults() {
        let query: HistoryQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 20);
        assert_eq!(query.offset, 0);
        assert!(query.transaction_type.is_none());
        assert!(query.min_amount.is_none());
    }
}
