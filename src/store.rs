//! persistence boundary for the ledger.
//!
//! every mutating operation funnels into a single [`WriteBatch`] commit.
//! the store validates the entire batch (row versions, referential
//! integrity, duplicate request ids) before applying anything, so a batch
//! either lands in full or not at all. charge rows carry a monotonically
//! increasing version; an update whose expected version no longer matches
//! the stored row fails the whole batch with a conflict.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::errors::{LedgerError, Result};
use crate::records::{Charge, Payment};
use crate::types::{ChargeId, FeeId, PaymentId, RequestId, StudentId};

/// one write inside a batch
#[derive(Debug, Clone)]
pub enum LedgerWrite {
    InsertCharge(Charge),
    /// `charge` carries the mutated row with the version the caller read;
    /// the store checks that version and bumps it on apply
    UpdateCharge(Charge),
    InsertPayment(Payment),
}

/// an atomic unit of writes, optionally tagged with an idempotency key
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub request_id: Option<RequestId>,
    writes: Vec<LedgerWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(request_id: Option<RequestId>) -> Self {
        Self {
            request_id,
            writes: Vec::new(),
        }
    }

    pub fn insert_charge(&mut self, charge: Charge) {
        self.writes.push(LedgerWrite::InsertCharge(charge));
    }

    pub fn update_charge(&mut self, charge: Charge) {
        self.writes.push(LedgerWrite::UpdateCharge(charge));
    }

    pub fn insert_payment(&mut self, payment: Payment) {
        self.writes.push(LedgerWrite::InsertPayment(payment));
    }

    pub fn writes(&self) -> &[LedgerWrite] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// result of a commit attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    /// the batch's request id was already committed; the listed payments
    /// are the ones the original commit produced
    AlreadyApplied { payment_ids: Vec<PaymentId> },
}

/// transactional storage for charges and payments
pub trait LedgerStore {
    fn charge(&self, id: ChargeId) -> Result<Charge>;
    fn charges_for_student(&self, student_id: StudentId) -> Result<Vec<Charge>>;
    fn charges_for_fee(&self, fee_id: FeeId) -> Result<Vec<Charge>>;
    fn payment(&self, id: PaymentId) -> Result<Payment>;
    fn payments_for_charge(&self, charge_id: ChargeId) -> Result<Vec<Payment>>;
    fn payments_for_students(&self, student_ids: &[StudentId]) -> Result<Vec<Payment>>;

    /// apply the batch atomically. validation of every write happens before
    /// any write is applied; on any failure the store is unchanged.
    fn commit(&self, batch: WriteBatch) -> Result<CommitOutcome>;
}

#[derive(Debug, Default)]
struct Tables {
    charges: HashMap<ChargeId, Charge>,
    payments: Vec<Payment>,
    applied_requests: HashMap<RequestId, Vec<PaymentId>>,
}

/// in-memory store with serializable commit semantics
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| LedgerError::Storage {
            message: "store lock poisoned".to_string(),
        })
    }
}

impl LedgerStore for MemoryStore {
    fn charge(&self, id: ChargeId) -> Result<Charge> {
        self.lock()?
            .charges
            .get(&id)
            .cloned()
            .ok_or(LedgerError::ChargeNotFound { id })
    }

    fn charges_for_student(&self, student_id: StudentId) -> Result<Vec<Charge>> {
        let tables = self.lock()?;
        let mut charges: Vec<Charge> = tables
            .charges
            .values()
            .filter(|c| c.student_id == student_id)
            .cloned()
            .collect();
        charges.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(charges)
    }

    fn charges_for_fee(&self, fee_id: FeeId) -> Result<Vec<Charge>> {
        let tables = self.lock()?;
        Ok(tables
            .charges
            .values()
            .filter(|c| c.fee_id == fee_id)
            .cloned()
            .collect())
    }

    fn payment(&self, id: PaymentId) -> Result<Payment> {
        self.lock()?
            .payments
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(LedgerError::Storage {
                message: format!("payment {id} not found"),
            })
    }

    fn payments_for_charge(&self, charge_id: ChargeId) -> Result<Vec<Payment>> {
        let tables = self.lock()?;
        Ok(tables
            .payments
            .iter()
            .filter(|p| p.charge_id == charge_id)
            .cloned()
            .collect())
    }

    fn payments_for_students(&self, student_ids: &[StudentId]) -> Result<Vec<Payment>> {
        let tables = self.lock()?;
        Ok(tables
            .payments
            .iter()
            .filter(|p| student_ids.contains(&p.student_id))
            .cloned()
            .collect())
    }

    fn commit(&self, batch: WriteBatch) -> Result<CommitOutcome> {
        let mut tables = self.lock()?;

        // duplicate resubmission: report the original payments, touch nothing
        if let Some(request_id) = batch.request_id {
            if let Some(payment_ids) = tables.applied_requests.get(&request_id) {
                debug!(%request_id, "duplicate request id, skipping commit");
                return Ok(CommitOutcome::AlreadyApplied {
                    payment_ids: payment_ids.clone(),
                });
            }
        }

        // validate every write against current state before applying any
        let mut updated = std::collections::HashSet::new();
        for write in batch.writes() {
            match write {
                LedgerWrite::InsertCharge(charge) => {
                    if tables.charges.contains_key(&charge.id) {
                        return Err(LedgerError::Storage {
                            message: format!("charge {} already exists", charge.id),
                        });
                    }
                }
                LedgerWrite::UpdateCharge(charge) => {
                    if !updated.insert(charge.id) {
                        return Err(LedgerError::Storage {
                            message: format!("charge {} updated twice in one batch", charge.id),
                        });
                    }
                    let stored = tables
                        .charges
                        .get(&charge.id)
                        .ok_or(LedgerError::ChargeNotFound { id: charge.id })?;
                    if stored.version != charge.version {
                        return Err(LedgerError::VersionConflict {
                            id: charge.id,
                            expected: charge.version,
                            found: stored.version,
                        });
                    }
                }
                LedgerWrite::InsertPayment(payment) => {
                    let in_batch = batch.writes().iter().any(|w| {
                        matches!(w, LedgerWrite::InsertCharge(c) if c.id == payment.charge_id)
                    });
                    if !in_batch && !tables.charges.contains_key(&payment.charge_id) {
                        return Err(LedgerError::ChargeNotFound {
                            id: payment.charge_id,
                        });
                    }
                }
            }
        }

        // apply
        let mut payment_ids = Vec::new();
        for write in batch.writes() {
            match write {
                LedgerWrite::InsertCharge(charge) => {
                    tables.charges.insert(charge.id, charge.clone());
                }
                LedgerWrite::UpdateCharge(charge) => {
                    let mut next = charge.clone();
                    next.version += 1;
                    tables.charges.insert(next.id, next);
                }
                LedgerWrite::InsertPayment(payment) => {
                    payment_ids.push(payment.id);
                    tables.payments.push(payment.clone());
                }
            }
        }

        if let Some(request_id) = batch.request_id {
            tables.applied_requests.insert(request_id, payment_ids);
        }

        Ok(CommitOutcome::Applied)
    }
}
