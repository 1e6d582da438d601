//! Error types for PayGate.

use crate::{Amount, Identity};
use thiserror::Error;

/// Main error type for PayGate operations.
///
/// Ledger reverts and host faults share one enum so that a rejected
/// transaction always surfaces a single identifiable reason.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaygateError {
    /// Privileged operation attempted by someone other than the owner.
    #[error("Caller {caller} is not the owner")]
    NotOwner { caller: Identity },

    /// Payment attempted while the ledger is paused.
    #[error("Ledger is paused")]
    Paused,

    /// First-time payment below the configured price.
    #[error("Insufficient payment: required {required}, provided {provided}")]
    InsufficientPayment { required: Amount, provided: Amount },

    /// Pause requested while already paused.
    #[error("Ledger is already paused")]
    AlreadyPaused,

    /// Unpause requested while not paused.
    #[error("Ledger is not paused")]
    NotPaused,

    /// Value attached to an operation that does not accept value.
    #[error("Operation does not accept value (sent {value})")]
    NonPayable { value: Amount },

    /// Arithmetic overflow.
    #[error("Arithmetic overflow")]
    Overflow,

    /// Caller's wallet cannot cover the attached value.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Amount, available: Amount },

    /// Call addressed to an identity with no ledger deployed.
    #[error("No ledger deployed at {0}")]
    UnknownLedger(Identity),

    /// Transaction sent from a ledger address. Ledgers only move value through their own calls.
    #[error("Ledger {0} cannot originate transactions")]
    LedgerCannotSend(Identity),

    /// Host is not accepting transactions.
    #[error("Host unavailable: {0}")]
    HostUnavailable(String),

    /// Malformed identity string.
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// Malformed amount string.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Internal host error.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl PaygateError {
    /// Check if this error is a revert raised by the ledger itself.
    pub fn is_revert(&self) -> bool {
        matches!(
            self,
            PaygateError::NotOwner { .. }
                | PaygateError::Paused
                | PaygateError::InsufficientPayment { .. }
                | PaygateError::AlreadyPaused
                | PaygateError::NotPaused
                | PaygateError::NonPayable { .. }
                | PaygateError::Overflow
        )
    }

    /// Get the stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            PaygateError::NotOwner { .. } => "NOT_OWNER",
            PaygateError::Paused => "PAUSED",
            PaygateError::InsufficientPayment { .. } => "INSUFFICIENT_PAYMENT",
            PaygateError::AlreadyPaused => "ALREADY_PAUSED",
            PaygateError::NotPaused => "NOT_PAUSED",
            PaygateError::NonPayable { .. } => "NON_PAYABLE",
            PaygateError::Overflow => "OVERFLOW",
            PaygateError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            PaygateError::UnknownLedger(_) => "UNKNOWN_LEDGER",
            PaygateError::LedgerCannotSend(_) => "LEDGER_CANNOT_SEND",
            PaygateError::HostUnavailable(_) => "HOST_UNAVAILABLE",
            PaygateError::InvalidIdentity(_) => "INVALID_IDENTITY",
            PaygateError::InvalidAmount(_) => "INVALID_AMOUNT",
            PaygateError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            PaygateError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type alias for PayGate operations.
pub type Result<T> = std::result::Result<T, PaygateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_classification() {
        assert!(PaygateError::Paused.is_revert());
        assert!(PaygateError::NotOwner {
            caller: Identity::ZERO
        }
        .is_revert());
        assert!(!PaygateError::UnknownLedger(Identity::ZERO).is_revert());
        assert!(!PaygateError::HostUnavailable("stopped".into()).is_revert());
        assert!(!PaygateError::LedgerCannotSend(Identity::ZERO).is_revert());
        assert_eq!(
            PaygateError::LedgerCannotSend(Identity::ZERO).error_code(),
            "LEDGER_CANNOT_SEND"
        );
    }

    #[test]
    fn test_error_codes() {
        let err = PaygateError::InsufficientPayment {
            required: Amount::new(100),
            provided: Amount::new(99),
        };
        assert_eq!(err.error_code(), "INSUFFICIENT_PAYMENT");
        assert_eq!(
            err.to_string(),
            "Insufficient payment: required 100, provided 99"
        );
    }
}
