//! Role-Based Access Control
//!
//! A static role→permission matrix is the single source of truth for what
//! each role may do. The matrix is immutable and queried read-only; role
//! reassignment is itself a privileged, audited operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLogBuilder, AuditLogService};
use crate::domain::{DomainError, OperationContext, UserRole};
use crate::error::AppError;
use crate::ledger::LedgerRepository;

/// Named capability flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    RegisterLogin,
    ManageOwnProfile,
    ViewOwnAccounts,
    ViewAllUserAccounts,
    CreateAccounts,
    InternalTransfers,
    ExternalTransfers,
    ViewOwnTransactions,
    ViewAllTransactions,
    FreezeUnfreezeAccounts,
    AssignChangeUserRoles,
    ViewAuditSecurityLogs,
    ManageSupportTickets,
    ViewOpenTickets,
    UpdateTicketStatus,
    AddTicketNotes,
}

impl Permission {
    pub const ALL: [Permission; 16] = [
        Permission::RegisterLogin,
        Permission::ManageOwnProfile,
        Permission::ViewOwnAccounts,
        Permission::ViewAllUserAccounts,
        Permission::CreateAccounts,
        Permission::InternalTransfers,
        Permission::ExternalTransfers,
        Permission::ViewOwnTransactions,
        Permission::ViewAllTransactions,
        Permission::FreezeUnfreezeAccounts,
        Permission::AssignChangeUserRoles,
        Permission::ViewAuditSecurityLogs,
        Permission::ManageSupportTickets,
        Permission::ViewOpenTickets,
        Permission::UpdateTicketStatus,
        Permission::AddTicketNotes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::RegisterLogin => "register_login",
            Permission::ManageOwnProfile => "manage_own_profile",
            Permission::ViewOwnAccounts => "view_own_accounts",
            Permission::ViewAllUserAccounts => "view_all_user_accounts",
            Permission::CreateAccounts => "create_accounts",
            Permission::InternalTransfers => "internal_transfers",
            Permission::ExternalTransfers => "external_transfers",
            Permission::ViewOwnTransactions => "view_own_transactions",
            Permission::ViewAllTransactions => "view_all_transactions",
            Permission::FreezeUnfreezeAccounts => "freeze_unfreeze_accounts",
            Permission::AssignChangeUserRoles => "assign_change_user_roles",
            Permission::ViewAuditSecurityLogs => "view_audit_security_logs",
            Permission::ManageSupportTickets => "manage_support_tickets",
            Permission::ViewOpenTickets => "view_open_tickets",
            Permission::UpdateTicketStatus => "update_ticket_status",
            Permission::AddTicketNotes => "add_ticket_notes",
        }
    }
}

/// The permission matrix. Capabilities are granted per role; there is no
/// finer-grained attribute logic beyond ownership checks in the handlers.
pub fn has_permission(role: UserRole, permission: Permission) -> bool {
    use Permission::*;

    match role {
        UserRole::Customer => matches!(
            permission,
            RegisterLogin
                | ManageOwnProfile
                | ViewOwnAccounts
                | CreateAccounts
                | InternalTransfers
                | ExternalTransfers
                | ViewOwnTransactions
                | ManageSupportTickets
                | AddTicketNotes
        ),
        UserRole::SupportAgent => matches!(
            permission,
            RegisterLogin
                | ManageOwnProfile
                | ViewOwnAccounts
                | ViewAllUserAccounts
                | ViewOwnTransactions
                | ViewAllTransactions
                | ManageSupportTickets
                | ViewOpenTickets
                | UpdateTicketStatus
                | AddTicketNotes
        ),
        UserRole::Auditor => matches!(
            permission,
            RegisterLogin
                | ViewOwnAccounts
                | ViewAllUserAccounts
                | ViewOwnTransactions
                | ViewAllTransactions
                | ViewAuditSecurityLogs
        ),
        UserRole::Admin => true,
    }
}

/// All permissions granted to a role, in matrix order
pub fn role_permissions(role: UserRole) -> Vec<Permission> {
    Permission::ALL
        .into_iter()
        .filter(|p| has_permission(role, *p))
        .collect()
}

/// Result of a role assignment
#[derive(Debug, Clone, Serialize)]
pub struct RoleAssignmentResult {
    pub user_id: Uuid,
    pub username: String,
    pub old_role: UserRole,
    pub new_role: UserRole,
}

/// A user row as listed by privileged queries
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// RBAC Service
///
/// Consults the static matrix and performs the audited user-management
/// operations (role assignment, activation).
#[derive(Debug, Clone)]
pub struct RbacService {
    pool: PgPool,
    ledger: LedgerRepository,
    audit: AuditLogService,
}

impl RbacService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: LedgerRepository::new(pool.clone()),
            audit: AuditLogService::new(pool.clone()),
            pool,
        }
    }

    /// Check a permission for a user by id (loads the role from the store)
    pub async fn check_permission(
        &self,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<bool, AppError> {
        let user = self.ledger.get_user(user_id).await?;
        Ok(user
            .map(|u| u.is_active && has_permission(u.role, permission))
            .unwrap_or(false))
    }

    /// Whether the user owns the given account
    pub async fn is_owner(&self, user_id: Uuid, account_id: Uuid) -> Result<bool, AppError> {
        let account = self.ledger.get_account(account_id).await?;
        Ok(account.map(|a| a.user_id == user_id).unwrap_or(false))
    }

    /// Role and full permission set for a user
    pub async fn get_user_permissions(
        &self,
        user_id: Uuid,
    ) -> Result<(UserRole, Vec<Permission>), AppError> {
        let user = self
            .ledger
            .get_user(user_id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(user_id.to_string()))?;

        Ok((user.role, role_permissions(user.role)))
    }

    /// Assign a new role to a user. Admin-gated by the caller; the change
    /// itself is audited with the old and new role.
    pub async fn assign_role(
        &self,
        user_id: Uuid,
        new_role: &str,
        context: &OperationContext,
    ) -> Result<RoleAssignmentResult, AppError> {
        let new_role = UserRole::from_str(new_role)?;

        let user = self
            .ledger
            .get_user(user_id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(user_id.to_string()))?;

        let old_role = user.role;

        sqlx::query("UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(new_role)
            .execute(&self.pool)
            .await?;

        self.audit
            .record(
                AuditLogBuilder::new(AuditAction::AdminAction)
                    .resource_type("user")
                    .resource_id(user_id)
                    .details(format!("Role changed from {} to {}", old_role, new_role)),
                context,
            )
            .await;

        Ok(RoleAssignmentResult {
            user_id,
            username: user.username,
            old_role,
            new_role,
        })
    }

    /// Deactivate a user (soft delete); their accounts remain but the auth
    /// collaborator stops resolving them as an acting user.
    pub async fn deactivate_user(
        &self,
        user_id: Uuid,
        context: &OperationContext,
    ) -> Result<UserSummary, AppError> {
        self.set_user_active(user_id, false, "User deactivated", context)
            .await
    }

    /// Reactivate a previously deactivated user
    pub async fn activate_user(
        &self,
        user_id: Uuid,
        context: &OperationContext,
    ) -> Result<UserSummary, AppError> {
        self.set_user_active(user_id, true, "User activated", context)
            .await
    }

    async fn set_user_active(
        &self,
        user_id: Uuid,
        is_active: bool,
        what: &str,
        context: &OperationContext,
    ) -> Result<UserSummary, AppError> {
        let user = self
            .ledger
            .get_user(user_id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(user_id.to_string()))?;

        sqlx::query("UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(is_active)
            .execute(&self.pool)
            .await?;

        self.audit
            .record(
                AuditLogBuilder::new(AuditAction::AdminAction)
                    .resource_type("user")
                    .resource_id(user_id)
                    .details(format!("{}: {}", what, user.username)),
                context,
            )
            .await;

        Ok(UserSummary {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            is_active,
            created_at: user.created_at,
        })
    }

    /// List users holding a given role (privileged, paginated)
    pub async fn users_by_role(
        &self,
        role: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<UserSummary>, i64), AppError> {
        let role = UserRole::from_str(role)?;

        let rows: Vec<(Uuid, String, String, String, UserRole, bool, DateTime<Utc>)> =
            sqlx::query_as(
                r#"
                SELECT id, username, email, full_name, role, is_active, created_at
                FROM users
                WHERE role = $1
                ORDER BY created_at ASC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(role)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role)
            .fetch_one(&self.pool)
            .await?;

        let users = rows
            .into_iter()
            .map(
                |(id, username, email, full_name, role, is_active, created_at)| UserSummary {
                    id,
                    username,
                    email,
                    full_name,
                    role,
                    is_active,
                    created_at,
                },
            )
            .collect();

        Ok((users, total))
    }
}
