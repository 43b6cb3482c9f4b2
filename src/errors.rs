use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::ChargeStatus;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("invalid charge amount: {amount}")]
    InvalidChargeAmount {
        amount: Money,
    },

    #[error("payment exceeds remaining balance: balance {balance}, provided {provided}")]
    PaymentExceedsBalance {
        balance: Money,
        provided: Money,
    },

    #[error("fee not found: {id}")]
    FeeNotFound {
        id: Uuid,
    },

    #[error("charge not found: {id}")]
    ChargeNotFound {
        id: Uuid,
    },

    #[error("student not found: {id}")]
    StudentNotFound {
        id: Uuid,
    },

    #[error("scope resolved to zero students")]
    EmptyScope,

    #[error("allocation requires at least one charge")]
    EmptyAllocation,

    #[error("charge listed more than once in allocation: {id}")]
    DuplicateChargeInAllocation {
        id: Uuid,
    },

    #[error("nothing outstanding: every selected charge is settled or waived")]
    NothingOutstanding,

    #[error("charge not payable: current status is {status:?}")]
    ChargeNotPayable {
        status: ChargeStatus,
    },

    #[error("cannot waive a fully paid charge: {id}")]
    CannotWaivePaid {
        id: Uuid,
    },

    #[error("charge already waived: {id}")]
    AlreadyWaived {
        id: Uuid,
    },

    #[error("concurrent modification of charge {id}: expected version {expected}, found {found}")]
    VersionConflict {
        id: Uuid,
        expected: u64,
        found: u64,
    },

    #[error("batch commit failed for {failed:?}")]
    BatchFailed {
        failed: Vec<Uuid>,
    },

    #[error("storage failure: {message}")]
    Storage {
        message: String,
    },
}

/// coarse taxonomy for callers; every variant classifies into exactly one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Persistence,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidPaymentAmount { .. }
            | LedgerError::InvalidChargeAmount { .. }
            | LedgerError::PaymentExceedsBalance { .. }
            | LedgerError::EmptyAllocation
            | LedgerError::DuplicateChargeInAllocation { .. }
            | LedgerError::NothingOutstanding
            | LedgerError::ChargeNotPayable { .. }
            | LedgerError::CannotWaivePaid { .. }
            | LedgerError::AlreadyWaived { .. } => ErrorKind::Validation,

            LedgerError::FeeNotFound { .. }
            | LedgerError::ChargeNotFound { .. }
            | LedgerError::StudentNotFound { .. }
            | LedgerError::EmptyScope => ErrorKind::NotFound,

            LedgerError::VersionConflict { .. } => ErrorKind::Conflict,

            LedgerError::BatchFailed { .. }
            | LedgerError::Storage { .. } => ErrorKind::Persistence,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_kinds() {
        let validation = LedgerError::InvalidPaymentAmount { amount: Money::ZERO };
        assert_eq!(validation.kind(), ErrorKind::Validation);

        let not_found = LedgerError::ChargeNotFound { id: Uuid::new_v4() };
        assert_eq!(not_found.kind(), ErrorKind::NotFound);

        let conflict = LedgerError::VersionConflict {
            id: Uuid::new_v4(),
            expected: 1,
            found: 2,
        };
        assert_eq!(conflict.kind(), ErrorKind::Conflict);

        let storage = LedgerError::Storage { message: "disk".to_string() };
        assert_eq!(storage.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn test_error_display() {
        let err = LedgerError::PaymentExceedsBalance {
            balance: Money::from_major(50),
            provided: Money::from_major(80),
        };
        assert_eq!(
            err.to_string(),
            "payment exceeds remaining balance: balance 50, provided 80"
        );
    }
}
