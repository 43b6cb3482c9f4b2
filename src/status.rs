use crate::decimal::Money;
use crate::types::ChargeStatus;

/// derive a charge's lifecycle status from its balances.
///
/// the waived override wins unconditionally; otherwise the status is a pure
/// function of how much has accumulated against the snapshot amount.
/// payments only ever move a charge forward through
/// pending -> partial -> paid.
pub fn derive_status(amount: Money, amount_paid: Money, waived: bool) -> ChargeStatus {
    if waived {
        ChargeStatus::Waived
    } else if amount_paid >= amount {
        ChargeStatus::Paid
    } else if amount_paid > Money::ZERO {
        ChargeStatus::Partial
    } else {
        ChargeStatus::Pending
    }
}
