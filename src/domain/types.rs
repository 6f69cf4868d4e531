//! Closed domain enums
//!
//! Role, status and type values arriving from callers as strings are parsed
//! into these tagged types at the boundary. An unrecognized string is a
//! single `InvalidEnumValue` error, never a silent default.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::DomainError;

/// User roles in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    SupportAgent,
    Auditor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::SupportAgent => "support_agent",
            UserRole::Auditor => "auditor",
            UserRole::Admin => "admin",
        }
    }

    /// All roles, for matrix iteration
    pub const ALL: [UserRole; 4] = [
        UserRole::Customer,
        UserRole::SupportAgent,
        UserRole::Auditor,
        UserRole::Admin,
    ];
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(UserRole::Customer),
            "support_agent" => Ok(UserRole::SupportAgent),
            "auditor" => Ok(UserRole::Auditor),
            "admin" => Ok(UserRole::Admin),
            _ => Err(DomainError::InvalidEnumValue {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}

/// Account status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Frozen,
    Closed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Frozen => "frozen",
            AccountStatus::Closed => "closed",
        }
    }
}

impl Default for AccountStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "frozen" => Ok(AccountStatus::Frozen),
            "closed" => Ok(AccountStatus::Closed),
            _ => Err(DomainError::InvalidEnumValue {
                kind: "account status",
                value: s.to_string(),
            }),
        }
    }
}

/// Account types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checking" => Ok(AccountType::Checking),
            "savings" => Ok(AccountType::Savings),
            _ => Err(DomainError::InvalidEnumValue {
                kind: "account type",
                value: s.to_string(),
            }),
        }
    }
}

/// Transaction types
///
/// Every transfer is recorded twice: a DEBIT row from the sender account's
/// perspective and a CREDIT row from the receiver's, sharing one
/// transaction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum TransactionType {
    Debit,
    Credit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Debit => "debit",
            TransactionType::Credit => "credit",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(TransactionType::Debit),
            "credit" => Ok(TransactionType::Credit),
            _ => Err(DomainError::InvalidEnumValue {
                kind: "transaction type",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in UserRole::ALL {
            let parsed: UserRole = role.as_str().parse().unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn test_invalid_role_rejected() {
        let result: Result<UserRole, _> = "superuser".parse();
        assert!(matches!(
            result,
            Err(DomainError::InvalidEnumValue { kind: "role", .. })
        ));
    }

    #[test]
    fn test_account_status_parse() {
        assert_eq!(
            "frozen".parse::<AccountStatus>().unwrap(),
            AccountStatus::Frozen
        );
        assert!("FROZEN".parse::<AccountStatus>().is_err());
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!(
            "savings".parse::<AccountType>().unwrap(),
            AccountType::Savings
        );
        assert!("money_market".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_transaction_type_serde() {
        let json = serde_json::to_string(&TransactionType::Debit).unwrap();
        assert_eq!(json, r#""debit""#);
    }
}
