pub mod allocation;
pub mod recorder;

use chrono::{DateTime, Utc};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{ChargeId, PaymentMethod, RequestId};

pub use allocation::{plan_allocation, AllocationPlan, AllocationResult};
pub use recorder::PaymentRecorder;

/// a request to record one payment against one charge
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub charge_id: ChargeId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    /// defaults to the time provider's now when absent
    pub payment_date: Option<DateTime<Utc>>,
    /// idempotency key; resubmitting the same key is a no-op
    pub request_id: Option<RequestId>,
}

impl PaymentRequest {
    pub fn new(charge_id: ChargeId, amount: Money, method: PaymentMethod) -> Self {
        Self {
            charge_id,
            amount,
            method,
            reference: None,
            notes: None,
            payment_date: None,
            request_id: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_positive() {
            return Err(LedgerError::InvalidPaymentAmount {
                amount: self.amount,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_request_validation() {
        let mut request =
            PaymentRequest::new(Uuid::new_v4(), Money::from_major(40), PaymentMethod::Cash);
        assert!(request.validate().is_ok());

        request.amount = Money::ZERO;
        assert!(matches!(
            request.validate(),
            Err(LedgerError::InvalidPaymentAmount { .. })
        ));

        request.amount = Money::ZERO - Money::from_major(5);
        assert!(request.validate().is_err());
    }
}
