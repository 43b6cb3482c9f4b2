use serde::{Deserialize, Serialize};

/// what to do when a payment exceeds the charge's remaining balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverpaymentPolicy {
    /// accept in full; the charge ends up overpaid (negative balance)
    Accept,
    /// truncate the payment to the remaining balance
    Clamp,
    /// reject the payment outright
    Reject,
}

/// ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub overpayment_policy: OverpaymentPolicy,
    /// automatic whole-operation retries after a version conflict
    pub conflict_retries: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            // the legacy system accepted overpayment silently; keep that
            // behavior unless configured otherwise
            overpayment_policy: OverpaymentPolicy::Accept,
            conflict_retries: 1,
        }
    }
}
