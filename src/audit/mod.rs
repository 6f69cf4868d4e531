//! Audit Log Service
//!
//! Append-only record of security- and business-relevant events, with hash
//! chain verification for tamper evidence. Audit writes never fail the
//! operation they document: `record` swallows its own errors after logging
//! them to the operational channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::OperationContext;

/// Audit log entry for database storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub previous_hash: String,
    pub current_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Audit action types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    LoginFailed,
    AccountFreeze,
    AccountUnfreeze,
    Transfer,
    AdminAction,
    SuspiciousActivity,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "login",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::AccountFreeze => "account_freeze",
            AuditAction::AccountUnfreeze => "account_unfreeze",
            AuditAction::Transfer => "transfer",
            AuditAction::AdminAction => "admin_action",
            AuditAction::SuspiciousActivity => "suspicious_activity",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = crate::domain::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(AuditAction::Login),
            "login_failed" => Ok(AuditAction::LoginFailed),
            "account_freeze" => Ok(AuditAction::AccountFreeze),
            "account_unfreeze" => Ok(AuditAction::AccountUnfreeze),
            "transfer" => Ok(AuditAction::Transfer),
            "admin_action" => Ok(AuditAction::AdminAction),
            "suspicious_activity" => Ok(AuditAction::SuspiciousActivity),
            _ => Err(crate::domain::DomainError::InvalidEnumValue {
                kind: "audit action",
                value: s.to_string(),
            }),
        }
    }
}

/// Builder for audit log entries
#[derive(Debug, Clone)]
pub struct AuditLogBuilder {
    action: AuditAction,
    resource_type: Option<String>,
    resource_id: Option<String>,
    details: Option<String>,
}

impl AuditLogBuilder {
    /// Create a new audit log builder
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            resource_type: None,
            resource_id: None,
            details: None,
        }
    }

    /// Set the resource type
    pub fn resource_type(mut self, resource_type: &str) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self
    }

    /// Set the resource ID
    pub fn resource_id(mut self, resource_id: impl ToString) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }

    /// Set the free-text details
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Audit Log Service
#[derive(Debug, Clone)]
pub struct AuditLogService {
    pool: PgPool,
}

impl AuditLogService {
    /// Create a new AuditLogService
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Write an audit log entry, fire-and-forget.
    ///
    /// A failed write is logged operationally and swallowed: the business
    /// operation it documents has already committed and must not be rolled
    /// back or failed because of its audit trail.
    pub async fn record(&self, builder: AuditLogBuilder, context: &OperationContext) {
        if let Err(e) = self.try_record(&builder, context).await {
            tracing::warn!(
                action = %builder.action,
                error = %e,
                "Audit log write failed; continuing without audit entry"
            );
        }
    }

    async fn try_record(
        &self,
        builder: &AuditLogBuilder,
        context: &OperationContext,
    ) -> Result<i64, AuditLogError> {
        // previous_hash and current_hash are set by the DB trigger
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO audit_logs (user_id, action, resource_type, resource_id, details, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(context.acting_user_id)
        .bind(builder.action.as_str())
        .bind(&builder.resource_type)
        .bind(&builder.resource_id)
        .bind(&builder.details)
        .bind(context.client_ip.map(|ip| ip.to_string()))
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(
            audit_id = id,
            action = %builder.action,
            "Audit log entry created"
        );

        Ok(id)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get recent audit logs, newest first
    pub async fn get_recent(&self, limit: i64) -> Result<Vec<AuditLogEntry>, AuditLogError> {
        self.query(
            "SELECT id, user_id, action, resource_type, resource_id, details, ip_address,
                    previous_hash, current_hash, created_at
             FROM audit_logs
             ORDER BY id DESC
             LIMIT $1",
            None,
            None,
            limit,
        )
        .await
    }

    /// Get audit logs for a specific user
    pub async fn get_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, AuditLogError> {
        self.query(
            "SELECT id, user_id, action, resource_type, resource_id, details, ip_address,
                    previous_hash, current_hash, created_at
             FROM audit_logs
             WHERE user_id = $2
             ORDER BY id DESC
             LIMIT $1",
            Some(user_id),
            None,
            limit,
        )
        .await
    }

    /// Get audit logs with a specific action
    pub async fn get_by_action(
        &self,
        action: AuditAction,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, AuditLogError> {
        self.query(
            "SELECT id, user_id, action, resource_type, resource_id, details, ip_address,
                    previous_hash, current_hash, created_at
             FROM audit_logs
             WHERE action = $2
             ORDER BY id DESC
             LIMIT $1",
            None,
            Some(action),
            limit,
        )
        .await
    }

    async fn query(
        &self,
        sql: &str,
        user_id: Option<Uuid>,
        action: Option<AuditAction>,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, AuditLogError> {
        let mut q = sqlx::query_as::<
            _,
            (
                i64,
                Option<Uuid>,
                String,
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
                String,
                String,
                DateTime<Utc>,
            ),
        >(sql)
        .bind(limit);

        if let Some(user_id) = user_id {
            q = q.bind(user_id);
        }
        if let Some(action) = action {
            q = q.bind(action.as_str());
        }

        let entries = q.fetch_all(&self.pool).await?;

        Ok(entries
            .into_iter()
            .map(
                |(
                    id,
                    user_id,
                    action,
                    resource_type,
                    resource_id,
                    details,
                    ip_address,
                    previous_hash,
                    current_hash,
                    created_at,
                )| AuditLogEntry {
                    id,
                    user_id,
                    action,
                    resource_type,
                    resource_id,
                    details,
                    ip_address,
                    previous_hash,
                    current_hash,
                    created_at,
                },
            )
            .collect())
    }

    // =========================================================================
    // Hash chain verification
    // =========================================================================

    /// Verify the integrity of the audit log hash chain.
    /// Recomputes each entry's hash with the same formula the DB trigger uses.
    pub async fn verify_hash_chain(
        &self,
        limit: Option<i64>,
    ) -> Result<ChainVerificationResult, AuditLogError> {
        let limit = limit.unwrap_or(1000);

        let entries: Vec<(
            i64,
            String,
            Option<Uuid>,
            Option<String>,
            Option<String>,
            Option<String>,
            String,
            String,
        )> = sqlx::query_as(
            r#"
            SELECT id, action, user_id, resource_type, resource_id, details,
                   previous_hash, current_hash
            FROM audit_logs
            ORDER BY id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        if entries.is_empty() {
            return Ok(ChainVerificationResult {
                is_valid: true,
                entries_checked: 0,
                first_invalid_entry: None,
                expected_hash: None,
                actual_hash: None,
            });
        }

        let mut previous_hash =
            "0000000000000000000000000000000000000000000000000000000000000000".to_string();

        for (id, action, user_id, resource_type, resource_id, details, prev_hash, current_hash) in
            &entries
        {
            // Verify chain linkage
            if prev_hash != &previous_hash {
                return Ok(ChainVerificationResult {
                    is_valid: false,
                    entries_checked: *id as u64,
                    first_invalid_entry: Some(*id),
                    expected_hash: Some(previous_hash),
                    actual_hash: Some(prev_hash.clone()),
                });
            }

            // Recalculate hash
            let hash_input = format!(
                "{}{}{}{}{}{}{}",
                id,
                action,
                user_id.map(|u| u.to_string()).unwrap_or_default(),
                resource_type.clone().unwrap_or_default(),
                resource_id.clone().unwrap_or_default(),
                details.clone().unwrap_or_default(),
                prev_hash
            );

            let calculated_hash = sha256_hex(&hash_input);

            if &calculated_hash != current_hash {
                return Ok(ChainVerificationResult {
                    is_valid: false,
                    entries_checked: *id as u64,
                    first_invalid_entry: Some(*id),
                    expected_hash: Some(calculated_hash),
                    actual_hash: Some(current_hash.clone()),
                });
            }

            previous_hash = current_hash.clone();
        }

        Ok(ChainVerificationResult {
            is_valid: true,
            entries_checked: entries.len() as u64,
            first_invalid_entry: None,
            expected_hash: None,
            actual_hash: None,
        })
    }
}

/// Result of hash chain verification
#[derive(Debug, Clone, Serialize)]
pub struct ChainVerificationResult {
    pub is_valid: bool,
    pub entries_checked: u64,
    pub first_invalid_entry: Option<i64>,
    pub expected_hash: Option<String>,
    pub actual_hash: Option<String>,
}

/// Calculate SHA-256 hash and return as hex string
fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Audit log errors
#[derive(Debug, thiserror::Error)]
pub enum AuditLogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

// =========================================================================
// Tests
// =========================================================================
