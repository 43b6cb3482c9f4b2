//! end-to-end flows over the public ledger API: payment recording,
//! family split payments, atomicity under storage failure, idempotent
//! resubmission, and conflict retry.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use fee_ledger_rs::{
    Charge, ChargeId, ChargeStatus, CommitOutcome, Fee, FeeCategory, FeeId, FeeLedger, FeeScope,
    InMemoryCatalog, InMemoryRoster, LedgerConfig, LedgerError, LedgerStore, MemoryStore, Money,
    OverpaymentPolicy, Payment, PaymentId, PaymentMethod, PaymentRequest, SafeTimeProvider,
    StudentId, StudentRecord, TimeSource, Uuid, WriteBatch, YearFilter,
};

fn test_time() -> SafeTimeProvider {
    SafeTimeProvider::new(TimeSource::Test(fee_ledger_rs::chrono::Utc::now()))
}

struct School {
    catalog: InMemoryCatalog,
    roster: InMemoryRoster,
    tuition: FeeId,
}

impl School {
    fn new(tuition_amount: i64) -> Self {
        let mut catalog = InMemoryCatalog::new();
        let tuition = catalog.insert(Fee::new(
            "Tuition 2025-2026",
            Money::from_major(tuition_amount),
            FeeCategory::Tuition,
            FeeScope::SchoolWide,
            "2025-2026",
        ));
        Self {
            catalog,
            roster: InMemoryRoster::new(),
            tuition,
        }
    }

    fn enroll(&mut self, guardian: &str) -> StudentId {
        self.roster.insert(StudentRecord {
            id: Uuid::new_v4(),
            active: true,
            grade_id: Uuid::new_v4(),
            class_id: Uuid::new_v4(),
            guardian: guardian.to_string(),
        })
    }

    fn ledger(self) -> FeeLedger<MemoryStore, InMemoryCatalog, InMemoryRoster> {
        FeeLedger::new(
            MemoryStore::new(),
            self.catalog,
            self.roster,
            LedgerConfig::default(),
        )
    }

    fn ledger_with(
        self,
        config: LedgerConfig,
    ) -> FeeLedger<MemoryStore, InMemoryCatalog, InMemoryRoster> {
        FeeLedger::new(MemoryStore::new(), self.catalog, self.roster, config)
    }
}

fn paid_sum_invariant<S: LedgerStore>(store: &S, charge_id: ChargeId) {
    let charge = store.charge(charge_id).unwrap();
    let payments = store.payments_for_charge(charge_id).unwrap();
    charge.assert_consistent(&payments);
}

#[test]
fn partial_then_full_payment() {
    let mut school = School::new(100);
    let student = school.enroll("guardian-a");
    let tuition = school.tuition;
    let mut ledger = school.ledger();
    let time = test_time();

    let charge = ledger
        .create_charge(student, tuition, None, None, &time)
        .unwrap();

    // 40 of 100 -> partial
    ledger
        .record_payment(
            PaymentRequest::new(charge.id, Money::from_major(40), PaymentMethod::Cash),
            &time,
        )
        .unwrap();
    let after_first = ledger.store().charge(charge.id).unwrap();
    assert_eq!(after_first.amount_paid, Money::from_major(40));
    assert_eq!(after_first.status, ChargeStatus::Partial);
    paid_sum_invariant(ledger.store(), charge.id);

    // remaining 60 -> paid
    ledger
        .record_payment(
            PaymentRequest::new(charge.id, Money::from_major(60), PaymentMethod::Check),
            &time,
        )
        .unwrap();
    let after_second = ledger.store().charge(charge.id).unwrap();
    assert_eq!(after_second.amount_paid, Money::from_major(100));
    assert_eq!(after_second.status, ChargeStatus::Paid);
    paid_sum_invariant(ledger.store(), charge.id);
}

#[test]
fn family_split_payment_exact() {
    // siblings owe 60 and 90; one 100 check covers the first charge and
    // part of the second
    let mut school = School::new(100);
    let older = school.enroll("parent@example.com");
    let younger = school.enroll("parent@example.com");
    let tuition = school.tuition;
    let mut ledger = school.ledger();
    let time = test_time();

    let charge_a = ledger
        .create_charge(older, tuition, Some(Money::from_major(60)), None, &time)
        .unwrap();
    let charge_b = ledger
        .create_charge(younger, tuition, Some(Money::from_major(90)), None, &time)
        .unwrap();

    let result = ledger
        .allocate(
            Money::from_major(100),
            &[charge_a.id, charge_b.id],
            PaymentMethod::Check,
            Some("check #4411".to_string()),
            None,
            &time,
        )
        .unwrap();

    assert_eq!(result.applied, vec![
        (charge_a.id, Money::from_major(60)),
        (charge_b.id, Money::from_major(40)),
    ]);
    assert_eq!(result.leftover, Money::ZERO);
    assert_eq!(result.payments.len(), 2);

    let a = ledger.store().charge(charge_a.id).unwrap();
    let b = ledger.store().charge(charge_b.id).unwrap();
    assert_eq!(a.status, ChargeStatus::Paid);
    assert_eq!(b.status, ChargeStatus::Partial);
    assert_eq!(b.balance(), Money::from_major(50));
    paid_sum_invariant(ledger.store(), charge_a.id);
    paid_sum_invariant(ledger.store(), charge_b.id);
}

#[test]
fn family_split_payment_with_leftover() {
    let mut school = School::new(100);
    let older = school.enroll("parent@example.com");
    let younger = school.enroll("parent@example.com");
    let tuition = school.tuition;
    let mut ledger = school.ledger();
    let time = test_time();

    let charge_a = ledger
        .create_charge(older, tuition, Some(Money::from_major(60)), None, &time)
        .unwrap();
    let charge_b = ledger
        .create_charge(younger, tuition, Some(Money::from_major(90)), None, &time)
        .unwrap();

    let result = ledger
        .allocate(
            Money::from_major(200),
            &[charge_a.id, charge_b.id],
            PaymentMethod::BankTransfer,
            None,
            None,
            &time,
        )
        .unwrap();

    // both settled, the unabsorbed 50 comes back to the caller
    assert_eq!(result.leftover, Money::from_major(50));
    assert_eq!(
        ledger.store().charge(charge_a.id).unwrap().status,
        ChargeStatus::Paid
    );
    assert_eq!(
        ledger.store().charge(charge_b.id).unwrap().status,
        ChargeStatus::Paid
    );

    let applied_sum: Money = result.applied.iter().map(|(_, take)| *take).sum();
    assert_eq!(applied_sum + result.leftover, Money::from_major(200));
}

#[test]
fn family_summary_spans_siblings() {
    let mut school = School::new(100);
    let older = school.enroll("parent@example.com");
    let younger = school.enroll("parent@example.com");
    let unrelated = school.enroll("other@example.com");
    let tuition = school.tuition;
    let mut ledger = school.ledger();
    let time = test_time();

    for student in [older, younger, unrelated] {
        ledger
            .create_charge(student, tuition, None, None, &time)
            .unwrap();
    }
    let charges = ledger.outstanding_charges(older).unwrap();
    ledger
        .record_payment(
            PaymentRequest::new(charges[0].id, Money::from_major(25), PaymentMethod::Cash),
            &time,
        )
        .unwrap();

    let family = ledger.summarize_family(older, &YearFilter::All).unwrap();
    assert_eq!(family.total_charged, Money::from_major(200));
    assert_eq!(family.total_paid, Money::from_major(25));
    assert_eq!(family.open_balance, Money::from_major(175));

    let single = ledger.summarize_student(unrelated, &YearFilter::All).unwrap();
    assert_eq!(single.total_charged, Money::from_major(100));
}

/// store decorator that can be armed to reject the next commit, standing in
/// for a storage-layer failure partway through a multi-charge allocation
struct BrokenCommitStore {
    inner: MemoryStore,
    fail_next_commit: AtomicBool,
}

impl BrokenCommitStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_next_commit: AtomicBool::new(false),
        }
    }

    fn arm(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

impl LedgerStore for BrokenCommitStore {
    fn charge(&self, id: ChargeId) -> fee_ledger_rs::Result<Charge> {
        self.inner.charge(id)
    }
    fn charges_for_student(&self, student_id: StudentId) -> fee_ledger_rs::Result<Vec<Charge>> {
        self.inner.charges_for_student(student_id)
    }
    fn charges_for_fee(&self, fee_id: FeeId) -> fee_ledger_rs::Result<Vec<Charge>> {
        self.inner.charges_for_fee(fee_id)
    }
    fn payment(&self, id: PaymentId) -> fee_ledger_rs::Result<Payment> {
        self.inner.payment(id)
    }
    fn payments_for_charge(&self, charge_id: ChargeId) -> fee_ledger_rs::Result<Vec<Payment>> {
        self.inner.payments_for_charge(charge_id)
    }
    fn payments_for_students(
        &self,
        student_ids: &[StudentId],
    ) -> fee_ledger_rs::Result<Vec<Payment>> {
        self.inner.payments_for_students(student_ids)
    }
    fn commit(&self, batch: WriteBatch) -> fee_ledger_rs::Result<CommitOutcome> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Storage {
                message: "simulated storage failure".to_string(),
            });
        }
        self.inner.commit(batch)
    }
}

#[test]
fn failed_allocation_applies_nothing() {
    let mut school = School::new(100);
    let student = school.enroll("guardian-a");
    let tuition = school.tuition;
    let catalog = school.catalog;
    let roster = school.roster;
    let mut ledger = FeeLedger::new(
        BrokenCommitStore::new(),
        catalog,
        roster,
        LedgerConfig::default(),
    );
    let time = test_time();

    let mut charge_ids = Vec::new();
    for _ in 0..3 {
        let charge = ledger
            .create_charge(student, tuition, None, None, &time)
            .unwrap();
        charge_ids.push(charge.id);
    }

    ledger.store().arm();
    let result = ledger.allocate(
        Money::from_major(250),
        &charge_ids,
        PaymentMethod::Cash,
        None,
        None,
        &time,
    );
    assert!(matches!(result, Err(LedgerError::Storage { .. })));

    // none of the three charges moved
    for id in &charge_ids {
        let charge = ledger.store().charge(*id).unwrap();
        assert_eq!(charge.amount_paid, Money::ZERO);
        assert_eq!(charge.status, ChargeStatus::Pending);
        assert_eq!(charge.version, 1);
        assert!(ledger.store().payments_for_charge(*id).unwrap().is_empty());
    }
}

#[test]
fn duplicate_payment_resubmission_is_ignored() {
    let mut school = School::new(100);
    let student = school.enroll("guardian-a");
    let tuition = school.tuition;
    let mut ledger = school.ledger();
    let time = test_time();

    let charge = ledger
        .create_charge(student, tuition, None, None, &time)
        .unwrap();

    let request_id = Uuid::new_v4();
    let mut request =
        PaymentRequest::new(charge.id, Money::from_major(40), PaymentMethod::Card);
    request.request_id = Some(request_id);

    let first = ledger.record_payment(request.clone(), &time).unwrap();
    let second = ledger.record_payment(request, &time).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(
        ledger.store().charge(charge.id).unwrap().amount_paid,
        Money::from_major(40)
    );
    assert_eq!(ledger.store().payments_for_charge(charge.id).unwrap().len(), 1);
}

#[test]
fn duplicate_allocation_resubmission_is_ignored() {
    let mut school = School::new(100);
    let older = school.enroll("parent@example.com");
    let younger = school.enroll("parent@example.com");
    let tuition = school.tuition;
    let mut ledger = school.ledger();
    let time = test_time();

    let charge_a = ledger
        .create_charge(older, tuition, Some(Money::from_major(60)), None, &time)
        .unwrap();
    let charge_b = ledger
        .create_charge(younger, tuition, Some(Money::from_major(90)), None, &time)
        .unwrap();

    let request_id = Uuid::new_v4();
    let first = ledger
        .allocate(
            Money::from_major(100),
            &[charge_a.id, charge_b.id],
            PaymentMethod::Check,
            None,
            Some(request_id),
            &time,
        )
        .unwrap();
    let second = ledger
        .allocate(
            Money::from_major(100),
            &[charge_a.id, charge_b.id],
            PaymentMethod::Check,
            None,
            Some(request_id),
            &time,
        )
        .unwrap();

    assert_eq!(first.applied, second.applied);
    assert_eq!(first.leftover, second.leftover);
    assert_eq!(
        ledger.store().charge(charge_a.id).unwrap().amount_paid,
        Money::from_major(60)
    );
    assert_eq!(
        ledger.store().charge(charge_b.id).unwrap().amount_paid,
        Money::from_major(40)
    );
}

/// store decorator that reports a version conflict on the first commit
/// only, as if another staff member had just written the same charge row
struct ContendedStore {
    inner: MemoryStore,
    conflicts_left: AtomicU32,
}

impl ContendedStore {
    fn new(conflicts: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            conflicts_left: AtomicU32::new(conflicts),
        }
    }
}

impl LedgerStore for ContendedStore {
    fn charge(&self, id: ChargeId) -> fee_ledger_rs::Result<Charge> {
        self.inner.charge(id)
    }
    fn charges_for_student(&self, student_id: StudentId) -> fee_ledger_rs::Result<Vec<Charge>> {
        self.inner.charges_for_student(student_id)
    }
    fn charges_for_fee(&self, fee_id: FeeId) -> fee_ledger_rs::Result<Vec<Charge>> {
        self.inner.charges_for_fee(fee_id)
    }
    fn payment(&self, id: PaymentId) -> fee_ledger_rs::Result<Payment> {
        self.inner.payment(id)
    }
    fn payments_for_charge(&self, charge_id: ChargeId) -> fee_ledger_rs::Result<Vec<Payment>> {
        self.inner.payments_for_charge(charge_id)
    }
    fn payments_for_students(
        &self,
        student_ids: &[StudentId],
    ) -> fee_ledger_rs::Result<Vec<Payment>> {
        self.inner.payments_for_students(student_ids)
    }
    fn commit(&self, batch: WriteBatch) -> fee_ledger_rs::Result<CommitOutcome> {
        let is_payment_batch = batch
            .writes()
            .iter()
            .any(|w| matches!(w, fee_ledger_rs::LedgerWrite::InsertPayment(_)));
        if is_payment_batch
            && self
                .conflicts_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(LedgerError::VersionConflict {
                id: Uuid::new_v4(),
                expected: 1,
                found: 2,
            });
        }
        self.inner.commit(batch)
    }
}

#[test]
fn conflict_retries_once_then_succeeds() {
    let mut school = School::new(100);
    let student = school.enroll("guardian-a");
    let tuition = school.tuition;
    let catalog = school.catalog;
    let roster = school.roster;
    let mut ledger = FeeLedger::new(
        ContendedStore::new(1),
        catalog,
        roster,
        LedgerConfig::default(),
    );
    let time = test_time();

    let charge = ledger
        .create_charge(student, tuition, None, None, &time)
        .unwrap();

    // first commit conflicts, the automatic retry lands
    ledger
        .record_payment(
            PaymentRequest::new(charge.id, Money::from_major(40), PaymentMethod::Cash),
            &time,
        )
        .unwrap();
    assert_eq!(
        ledger.store().charge(charge.id).unwrap().amount_paid,
        Money::from_major(40)
    );
}

#[test]
fn persistent_conflict_surfaces_after_retry() {
    let mut school = School::new(100);
    let student = school.enroll("guardian-a");
    let tuition = school.tuition;
    let catalog = school.catalog;
    let roster = school.roster;
    let mut ledger = FeeLedger::new(
        ContendedStore::new(u32::MAX),
        catalog,
        roster,
        LedgerConfig::default(),
    );
    let time = test_time();

    let charge = ledger
        .create_charge(student, tuition, None, None, &time)
        .unwrap();

    assert!(matches!(
        ledger.record_payment(
            PaymentRequest::new(charge.id, Money::from_major(40), PaymentMethod::Cash),
            &time,
        ),
        Err(LedgerError::VersionConflict { .. })
    ));
    assert_eq!(
        ledger.store().charge(charge.id).unwrap().amount_paid,
        Money::ZERO
    );
}

#[test]
fn overpayment_policies_govern_direct_payments() {
    let time = test_time();

    // default accepts, as the legacy system did
    let mut school = School::new(100);
    let student = school.enroll("guardian-a");
    let tuition = school.tuition;
    let mut ledger = school.ledger();
    let charge = ledger
        .create_charge(student, tuition, None, None, &time)
        .unwrap();
    ledger
        .record_payment(
            PaymentRequest::new(charge.id, Money::from_major(130), PaymentMethod::Cash),
            &time,
        )
        .unwrap();
    let overpaid = ledger.store().charge(charge.id).unwrap();
    assert_eq!(overpaid.amount_paid, Money::from_major(130));
    assert_eq!(overpaid.status, ChargeStatus::Paid);
    paid_sum_invariant(ledger.store(), charge.id);

    // reject refuses and leaves the charge untouched
    let mut school = School::new(100);
    let student = school.enroll("guardian-a");
    let tuition = school.tuition;
    let mut ledger = school.ledger_with(LedgerConfig {
        overpayment_policy: OverpaymentPolicy::Reject,
        ..LedgerConfig::default()
    });
    let charge = ledger
        .create_charge(student, tuition, None, None, &time)
        .unwrap();
    assert!(matches!(
        ledger.record_payment(
            PaymentRequest::new(charge.id, Money::from_major(130), PaymentMethod::Cash),
            &time,
        ),
        Err(LedgerError::PaymentExceedsBalance { .. })
    ));
    assert_eq!(
        ledger.store().charge(charge.id).unwrap().amount_paid,
        Money::ZERO
    );
}

#[test]
fn allocation_rejects_degenerate_input() {
    let mut school = School::new(100);
    let student = school.enroll("guardian-a");
    let tuition = school.tuition;
    let mut ledger = school.ledger();
    let time = test_time();

    let charge = ledger
        .create_charge(student, tuition, None, None, &time)
        .unwrap();

    assert!(matches!(
        ledger.allocate(Money::ZERO, &[charge.id], PaymentMethod::Cash, None, None, &time),
        Err(LedgerError::InvalidPaymentAmount { .. })
    ));
    assert!(matches!(
        ledger.allocate(Money::from_major(10), &[], PaymentMethod::Cash, None, None, &time),
        Err(LedgerError::EmptyAllocation)
    ));

    ledger
        .record_payment(
            PaymentRequest::new(charge.id, Money::from_major(100), PaymentMethod::Cash),
            &time,
        )
        .unwrap();
    assert!(matches!(
        ledger.allocate(
            Money::from_major(10),
            &[charge.id],
            PaymentMethod::Cash,
            None,
            None,
            &time
        ),
        Err(LedgerError::NothingOutstanding)
    ));
}
