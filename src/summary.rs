//! pure aggregation over ledger rows. nothing here mutates; the caller
//! supplies the charges, their payments, and the fee templates they
//! reference, and gets the display aggregates back.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::records::{Charge, Fee, Payment};
use crate::types::{ChargeId, FeeId, YearFilter};

/// per-student or per-family financial aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FinancialSummary {
    /// total owed across non-waived, non-donation charges
    pub total_charged: Money,
    /// total received against those charges
    pub total_paid: Money,
    /// total_charged - total_paid
    pub open_balance: Money,
    /// face value of waived charges
    pub waived_total: Money,
    /// money received against donation-category charges
    pub donation_total: Money,
}

/// aggregate charges and payments into a financial summary.
///
/// donation-category charges are never owed: they stay out of
/// total_charged/open_balance, and what was collected against them lands in
/// donation_total instead. waived charges drop out of both sides entirely,
/// regardless of any payment recorded before the waiver. the year filter
/// scopes charges (and, through their charge, payments) by the referenced
/// fee's academic year.
pub fn summarize(
    charges: &[Charge],
    payments: &[Payment],
    fees: &HashMap<FeeId, Fee>,
    year: &YearFilter,
) -> Result<FinancialSummary> {
    let mut summary = FinancialSummary::default();
    let mut owed: HashSet<ChargeId> = HashSet::new();
    let mut donations: HashSet<ChargeId> = HashSet::new();

    for charge in charges {
        let fee = fees
            .get(&charge.fee_id)
            .ok_or(LedgerError::FeeNotFound { id: charge.fee_id })?;
        if !year.matches(&fee.academic_year) {
            continue;
        }

        if charge.is_waived() {
            summary.waived_total += charge.amount;
        } else if fee.category.is_owed() {
            summary.total_charged += charge.amount;
            owed.insert(charge.id);
        } else {
            donations.insert(charge.id);
        }
    }

    for payment in payments {
        if owed.contains(&payment.charge_id) {
            summary.total_paid += payment.amount;
        } else if donations.contains(&payment.charge_id) {
            summary.donation_total += payment.amount;
        }
    }

    summary.open_balance = summary.total_charged - summary.total_paid;
    Ok(summary)
}
