//! Unit tests for handlers
//!
//! Database-backed behavior is covered by the integration tests; these
//! exercise command construction and the validation primitives.

#[cfg(test)]
mod tests {
    use crate::domain::{Amount, DomainError};
    use crate::handlers::{
        CreateAccountCommand, ExternalTransferCommand, InternalTransferCommand,
    };
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use uuid::Uuid;

    #[test]
    fn test_internal_transfer_command() {
        let acting = Uuid::new_v4();
        let sender = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        let cmd = InternalTransferCommand::new(acting, sender, receiver, "200.00".to_string());

        assert_eq!(cmd.acting_user_id, acting);
        assert_eq!(cmd.sender_account_id, sender);
        assert_eq!(cmd.receiver_account_id, receiver);
        assert_eq!(cmd.amount, "200.00");
        assert!(cmd.description.is_none());
    }

    #[test]
    fn test_internal_transfer_command_with_description() {
        let cmd = InternalTransferCommand::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "50.00".to_string(),
        )
        .with_description("Rent share".to_string());

        assert_eq!(cmd.description, Some("Rent share".to_string()));
    }

    #[test]
    fn test_external_transfer_command() {
        let cmd = ExternalTransferCommand::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "ACC-0123456789".to_string(),
            "75.25".to_string(),
        );

        assert_eq!(cmd.receiver_account_number, "ACC-0123456789");
        assert!(cmd.description.is_none());
    }

    #[test]
    fn test_create_account_command() {
        let user_id = Uuid::new_v4();
        let cmd = CreateAccountCommand::new(user_id, "checking".to_string(), "100.00".to_string());

        assert_eq!(cmd.user_id, user_id);
        assert_eq!(cmd.account_type, "checking");
        assert_eq!(cmd.opening_balance, "100.00");
    }

    #[test]
    fn test_transfer_amount_validation() {
        // The handler parses the command amount through Amount, so these
        // all fail before any database work
        let invalid_amounts = vec![
            "0",
            "-100",
            "abc",
            "10.001",
            "1000000000001",
        ];

        for amount_str in invalid_amounts {
            let result: Result<Amount, _> = amount_str.parse();
            assert!(result.is_err(), "Expected error for amount: {}", amount_str);
        }
    }

    #[test]
    fn test_transfer_amount_valid() {
        let amount = Amount::from_str("200.00").unwrap();
        assert_eq!(amount.value(), Decimal::from_str("200.00").unwrap());
    }

    #[test]
    fn test_invalid_account_type_error() {
        use crate::domain::AccountType;

        let result: Result<AccountType, DomainError> = "money_market".parse();
        assert!(matches!(
            result,
            Err(DomainError::InvalidEnumValue {
                kind: "account type",
                ..
            })
        ));
    }
}
