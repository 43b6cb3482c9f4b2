use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::OverpaymentPolicy;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::records::{Charge, Payment};
use crate::types::{PaymentMethod, RequestId};

/// applies a single payment to a single charge, honoring the overpayment
/// policy. the caller owns persistence: the mutated charge copy and the
/// returned payment row must land in the same commit.
#[derive(Debug, Clone, Copy)]
pub struct PaymentRecorder {
    policy: OverpaymentPolicy,
}

impl PaymentRecorder {
    pub fn new(policy: OverpaymentPolicy) -> Self {
        Self { policy }
    }

    /// validate, resolve the effective amount under the policy, mutate the
    /// charge copy, and build the payment row
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        charge: &mut Charge,
        amount: Money,
        method: PaymentMethod,
        reference: Option<String>,
        notes: Option<String>,
        payment_date: DateTime<Utc>,
        request_id: Option<RequestId>,
    ) -> Result<Payment> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidPaymentAmount { amount });
        }
        if charge.is_waived() {
            return Err(LedgerError::ChargeNotPayable {
                status: charge.status,
            });
        }

        let balance = charge.balance();
        let effective = match self.policy {
            OverpaymentPolicy::Accept => amount,
            OverpaymentPolicy::Clamp => {
                if !balance.is_positive() {
                    return Err(LedgerError::PaymentExceedsBalance {
                        balance: balance.max(Money::ZERO),
                        provided: amount,
                    });
                }
                if amount > balance {
                    warn!(charge_id = %charge.id, %amount, %balance, "clamping payment to remaining balance");
                }
                amount.min(balance)
            }
            OverpaymentPolicy::Reject => {
                if amount > balance {
                    return Err(LedgerError::PaymentExceedsBalance {
                        balance: balance.max(Money::ZERO),
                        provided: amount,
                    });
                }
                amount
            }
        };

        let payment = Payment::new(
            charge.student_id,
            charge.id,
            effective,
            method,
            reference,
            notes,
            payment_date,
            request_id,
        );
        charge.apply_payment(effective);

        Ok(payment)
    }
}
