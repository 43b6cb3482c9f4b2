use std::collections::{HashMap, HashSet};

use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{FeeCatalog, Roster};
use crate::config::LedgerConfig;
use crate::decimal::Money;
use crate::errors::{ErrorKind, LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::payments::{plan_allocation, AllocationResult, PaymentRecorder, PaymentRequest};
use crate::records::{Charge, Fee, Payment};
use crate::status::derive_status;
use crate::store::{CommitOutcome, LedgerStore, WriteBatch};
use crate::summary::{summarize, FinancialSummary};
use crate::types::{
    ChargeId, ChargeStatus, FeeId, PaymentMethod, RequestId, StudentId, StudentScope, YearFilter,
};

/// outcome of a scope-based bulk assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAssignOutcome {
    /// charges created by this call
    pub assigned: usize,
    /// students silently skipped because they were already charged
    pub skipped: usize,
}

/// the ledger service: every public operation is one logical transaction
/// against the store, retried once on version conflict.
pub struct FeeLedger<S, C, R> {
    store: S,
    catalog: C,
    roster: R,
    config: LedgerConfig,
    events: EventStore,
}

impl<S, C, R> FeeLedger<S, C, R>
where
    S: LedgerStore,
    C: FeeCatalog,
    R: Roster,
{
    pub fn new(store: S, catalog: C, roster: R, config: LedgerConfig) -> Self {
        Self {
            store,
            catalog,
            roster,
            config,
            events: EventStore::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    /// create one charge for one student, ad hoc. duplicates for the same
    /// (student, fee) pair are allowed here; only bulk assignment dedups.
    pub fn create_charge(
        &mut self,
        student_id: StudentId,
        fee_id: FeeId,
        amount: Option<Money>,
        notes: Option<String>,
        time_provider: &SafeTimeProvider,
    ) -> Result<Charge> {
        if !self.roster.student_exists(student_id) {
            return Err(LedgerError::StudentNotFound { id: student_id });
        }
        let fee = self.catalog.fee(fee_id)?;

        let amount = amount.unwrap_or(fee.amount);
        if !amount.is_positive() {
            return Err(LedgerError::InvalidChargeAmount { amount });
        }

        let now = time_provider.now();
        let charge = Charge::new(student_id, fee_id, amount, notes, now);

        let mut batch = WriteBatch::new();
        batch.insert_charge(charge.clone());
        self.store.commit(batch)?;

        self.events.emit(Event::ChargeCreated {
            charge_id: charge.id,
            student_id,
            fee_id,
            amount,
            timestamp: now,
        });

        Ok(charge)
    }

    /// assign a fee to every active student in scope, skipping students
    /// already charged for it. idempotent: a second call assigns nothing.
    pub fn bulk_assign(
        &mut self,
        fee_id: FeeId,
        scope: StudentScope,
        time_provider: &SafeTimeProvider,
    ) -> Result<BulkAssignOutcome> {
        let fee = self.catalog.fee(fee_id)?;

        let students = self.roster.active_students(scope);
        if students.is_empty() {
            return Err(LedgerError::EmptyScope);
        }

        let already_charged: HashSet<StudentId> = self
            .store
            .charges_for_fee(fee_id)?
            .into_iter()
            .map(|c| c.student_id)
            .collect();

        let now = time_provider.now();
        let mut batch = WriteBatch::new();
        let mut assigned = 0;
        let mut skipped = 0;

        for student_id in students {
            if already_charged.contains(&student_id) {
                debug!(%student_id, %fee_id, "already charged, skipping");
                skipped += 1;
                continue;
            }
            batch.insert_charge(Charge::new(student_id, fee_id, fee.amount, None, now));
            assigned += 1;
        }

        if !batch.is_empty() {
            self.store.commit(batch)?;
        }

        self.events.emit(Event::FeeBulkAssigned {
            fee_id,
            assigned,
            skipped,
            timestamp: now,
        });

        Ok(BulkAssignOutcome { assigned, skipped })
    }

    /// record one payment against one charge. the payment row, the cached
    /// amount_paid, and the derived status land in one version-checked
    /// commit; a conflict retries the whole operation once.
    pub fn record_payment(
        &mut self,
        request: PaymentRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<Payment> {
        request.validate()?;

        let mut attempts = 0;
        loop {
            match self.try_record_payment(&request, time_provider) {
                Err(e)
                    if e.kind() == ErrorKind::Conflict
                        && attempts < self.config.conflict_retries =>
                {
                    attempts += 1;
                    warn!(charge_id = %request.charge_id, attempt = attempts, "version conflict, retrying payment");
                }
                other => return other,
            }
        }
    }

    fn try_record_payment(
        &mut self,
        request: &PaymentRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<Payment> {
        let mut charge = self.store.charge(request.charge_id)?;
        let old_status = charge.status;

        let payment_date = request.payment_date.unwrap_or_else(|| time_provider.now());
        let recorder = PaymentRecorder::new(self.config.overpayment_policy);
        let payment = recorder.apply(
            &mut charge,
            request.amount,
            request.method,
            request.reference.clone(),
            request.notes.clone(),
            payment_date,
            request.request_id,
        )?;

        let mut batch = WriteBatch::with_request_id(request.request_id);
        batch.update_charge(charge.clone());
        batch.insert_payment(payment.clone());

        match self.store.commit(batch)? {
            CommitOutcome::Applied => {
                self.emit_payment_events(&payment, old_status, charge.status, payment_date);
                Ok(payment)
            }
            CommitOutcome::AlreadyApplied { payment_ids } => {
                let id = payment_ids.first().copied().ok_or(LedgerError::Storage {
                    message: "duplicate request recorded no payments".to_string(),
                })?;
                self.store.payment(id)
            }
        }
    }

    /// distribute one lump sum across an explicit, ordered list of charges,
    /// possibly spanning several siblings. all resulting payments and
    /// charge updates commit as one atomic unit; leftover is returned,
    /// never dropped.
    pub fn allocate(
        &mut self,
        total: Money,
        ordered_charges: &[ChargeId],
        method: PaymentMethod,
        reference: Option<String>,
        request_id: Option<RequestId>,
        time_provider: &SafeTimeProvider,
    ) -> Result<AllocationResult> {
        let mut attempts = 0;
        loop {
            match self.try_allocate(
                total,
                ordered_charges,
                method,
                reference.clone(),
                request_id,
                time_provider,
            ) {
                Err(e)
                    if e.kind() == ErrorKind::Conflict
                        && attempts < self.config.conflict_retries =>
                {
                    attempts += 1;
                    warn!(attempt = attempts, "version conflict, retrying allocation");
                }
                other => return other,
            }
        }
    }

    fn try_allocate(
        &mut self,
        total: Money,
        ordered_charges: &[ChargeId],
        method: PaymentMethod,
        reference: Option<String>,
        request_id: Option<RequestId>,
        time_provider: &SafeTimeProvider,
    ) -> Result<AllocationResult> {
        let mut charges = Vec::with_capacity(ordered_charges.len());
        for id in ordered_charges {
            charges.push(self.store.charge(*id)?);
        }

        let plan = plan_allocation(total, &charges)?;

        let now = time_provider.now();
        let mut batch = WriteBatch::with_request_id(request_id);
        let mut payments = Vec::with_capacity(plan.applied.len());
        let mut status_changes = Vec::new();

        for (charge_id, take) in &plan.applied {
            let charge = charges
                .iter_mut()
                .find(|c| c.id == *charge_id)
                .ok_or(LedgerError::ChargeNotFound { id: *charge_id })?;
            let old_status = charge.status;

            let payment = Payment::new(
                charge.student_id,
                charge.id,
                *take,
                method,
                reference.clone(),
                None,
                now,
                request_id,
            );
            charge.apply_payment(*take);

            if charge.status != old_status {
                status_changes.push((charge.id, old_status, charge.status));
            }
            batch.update_charge(charge.clone());
            batch.insert_payment(payment.clone());
            payments.push(payment);
        }

        match self.store.commit(batch)? {
            CommitOutcome::Applied => {
                for (charge_id, old_status, new_status) in status_changes {
                    self.events.emit(Event::StatusChanged {
                        charge_id,
                        old_status,
                        new_status,
                        timestamp: now,
                    });
                }
                self.events.emit(Event::AllocationApplied {
                    total,
                    charges_touched: plan.applied.len(),
                    leftover: plan.leftover,
                    timestamp: now,
                });

                Ok(AllocationResult {
                    applied: plan.applied,
                    leftover: plan.leftover,
                    payments,
                })
            }
            CommitOutcome::AlreadyApplied { payment_ids } => {
                let mut payments = Vec::with_capacity(payment_ids.len());
                for id in payment_ids {
                    payments.push(self.store.payment(id)?);
                }
                let applied: Vec<(ChargeId, Money)> =
                    payments.iter().map(|p| (p.charge_id, p.amount)).collect();
                let applied_sum: Money = applied.iter().map(|(_, take)| *take).sum();

                Ok(AllocationResult {
                    applied,
                    leftover: total - applied_sum,
                    payments,
                })
            }
        }
    }

    /// manually excuse a charge from collection. terminal; rejected on paid
    /// charges and on double waives.
    pub fn waive_charge(
        &mut self,
        charge_id: ChargeId,
        time_provider: &SafeTimeProvider,
    ) -> Result<Charge> {
        let mut attempts = 0;
        loop {
            match self.try_waive_charge(charge_id, time_provider) {
                Err(e)
                    if e.kind() == ErrorKind::Conflict
                        && attempts < self.config.conflict_retries =>
                {
                    attempts += 1;
                    warn!(%charge_id, attempt = attempts, "version conflict, retrying waive");
                }
                other => return other,
            }
        }
    }

    fn try_waive_charge(
        &mut self,
        charge_id: ChargeId,
        time_provider: &SafeTimeProvider,
    ) -> Result<Charge> {
        let mut charge = self.store.charge(charge_id)?;

        match charge.status {
            ChargeStatus::Paid => return Err(LedgerError::CannotWaivePaid { id: charge_id }),
            ChargeStatus::Waived => return Err(LedgerError::AlreadyWaived { id: charge_id }),
            ChargeStatus::Pending | ChargeStatus::Partial => {}
        }

        let now = time_provider.now();
        let old_status = charge.status;
        let outstanding = charge.balance();
        charge.status = derive_status(charge.amount, charge.amount_paid, true);
        charge.waived_at = Some(now);

        let mut batch = WriteBatch::new();
        batch.update_charge(charge.clone());
        self.store.commit(batch)?;

        self.events.emit(Event::ChargeWaived {
            charge_id,
            amount_outstanding: outstanding,
            timestamp: now,
        });
        self.events.emit(Event::StatusChanged {
            charge_id,
            old_status,
            new_status: charge.status,
            timestamp: now,
        });

        Ok(charge)
    }

    /// charges with a positive balance that are not waived, in stable
    /// created_at order, ready to feed straight into allocate
    pub fn outstanding_charges(&self, student_id: StudentId) -> Result<Vec<Charge>> {
        if !self.roster.student_exists(student_id) {
            return Err(LedgerError::StudentNotFound { id: student_id });
        }
        Ok(self
            .store
            .charges_for_student(student_id)?
            .into_iter()
            .filter(|c| c.is_outstanding())
            .collect())
    }

    /// financial summary for one student
    pub fn summarize_student(
        &self,
        student_id: StudentId,
        year: &YearFilter,
    ) -> Result<FinancialSummary> {
        if !self.roster.student_exists(student_id) {
            return Err(LedgerError::StudentNotFound { id: student_id });
        }
        self.summarize_students(&[student_id], year)
    }

    /// financial summary for a whole family: the student plus active
    /// siblings sharing the same guardian contact
    pub fn summarize_family(
        &self,
        student_id: StudentId,
        year: &YearFilter,
    ) -> Result<FinancialSummary> {
        let family = self.roster.family(student_id)?;
        self.summarize_students(&family, year)
    }

    fn summarize_students(
        &self,
        student_ids: &[StudentId],
        year: &YearFilter,
    ) -> Result<FinancialSummary> {
        let mut charges = Vec::new();
        for student_id in student_ids {
            charges.extend(self.store.charges_for_student(*student_id)?);
        }
        let payments = self.store.payments_for_students(student_ids)?;

        let mut fees: HashMap<FeeId, Fee> = HashMap::new();
        for charge in &charges {
            if !fees.contains_key(&charge.fee_id) {
                fees.insert(charge.fee_id, self.catalog.fee(charge.fee_id)?);
            }
        }

        summarize(&charges, &payments, &fees, year)
    }

    fn emit_payment_events(
        &mut self,
        payment: &Payment,
        old_status: ChargeStatus,
        new_status: ChargeStatus,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) {
        self.events.emit(Event::PaymentRecorded {
            payment_id: payment.id,
            charge_id: payment.charge_id,
            student_id: payment.student_id,
            amount: payment.amount,
            timestamp,
        });
        if new_status != old_status {
            self.events.emit(Event::StatusChanged {
                charge_id: payment.charge_id,
                old_status,
                new_status,
                timestamp,
            });
        }
    }
}
