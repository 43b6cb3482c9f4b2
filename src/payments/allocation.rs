//! split-payment allocation: spend one lump sum across an ordered list of
//! outstanding charges, possibly spanning several siblings.
//!
//! planning is pure. the caller supplies the charge rows in the order the
//! money should be applied (an explicit list, never a map), and gets back
//! one `(charge, take)` pair per charge touched plus whatever the selected
//! balances could not absorb. money is conserved on every path:
//! `sum(applied) + leftover == total`.

use std::collections::HashSet;

use tracing::debug;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::records::{Charge, Payment};
use crate::types::ChargeId;

/// planned split of one lump sum, before anything is written
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPlan {
    /// (charge, amount to apply), in allocation order
    pub applied: Vec<(ChargeId, Money)>,
    /// portion of the lump sum no selected charge could absorb; the caller
    /// decides its disposition, the engine never drops it
    pub leftover: Money,
}

/// committed outcome of an allocation
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationResult {
    pub applied: Vec<(ChargeId, Money)>,
    pub leftover: Money,
    /// one payment row per charge touched
    pub payments: Vec<Payment>,
}

/// compute the split of `total` across `charges`, front to back.
///
/// settled and waived charges are skipped. each outstanding charge absorbs
/// `min(remaining, balance)`, so a planned amount never exceeds the
/// charge's balance at planning time.
pub fn plan_allocation(total: Money, charges: &[Charge]) -> Result<AllocationPlan> {
    if !total.is_positive() {
        return Err(LedgerError::InvalidPaymentAmount { amount: total });
    }
    if charges.is_empty() {
        return Err(LedgerError::EmptyAllocation);
    }
    // a charge listed twice would absorb money twice against one balance
    let mut seen = HashSet::with_capacity(charges.len());
    for charge in charges {
        if !seen.insert(charge.id) {
            return Err(LedgerError::DuplicateChargeInAllocation { id: charge.id });
        }
    }

    let mut remaining = total;
    let mut applied = Vec::new();

    for charge in charges {
        if !remaining.is_positive() {
            break;
        }
        if !charge.is_outstanding() {
            debug!(charge_id = %charge.id, status = ?charge.status, "skipping settled or waived charge");
            continue;
        }

        let take = remaining.min(charge.balance());
        applied.push((charge.id, take));
        remaining -= take;
    }

    if applied.is_empty() {
        return Err(LedgerError::NothingOutstanding);
    }

    Ok(AllocationPlan {
        applied,
        leftover: remaining,
    })
}
