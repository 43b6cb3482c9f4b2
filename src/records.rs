use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::status::derive_status;
use crate::types::{
    ChargeId, ChargeStatus, FeeCategory, FeeId, FeeScope, PaymentId, PaymentMethod, RequestId,
    StudentId,
};

/// fee template: a reusable description of a chargeable item.
/// immutable once a charge references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub id: FeeId,
    pub name: String,
    pub description: String,
    pub amount: Money,
    pub category: FeeCategory,
    pub scope: FeeScope,
    pub due_date: Option<NaiveDate>,
    pub academic_year: String,
}

impl Fee {
    pub fn new(
        name: impl Into<String>,
        amount: Money,
        category: FeeCategory,
        scope: FeeScope,
        academic_year: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            amount,
            category,
            scope,
            due_date: None,
            academic_year: academic_year.into(),
        }
    }
}

/// charge: one fee applied to one student.
///
/// `amount` is a snapshot taken at creation and may diverge from the fee
/// template afterwards. `amount_paid` is a cached aggregate of the payments
/// referencing this charge; it is only ever written in the same commit as
/// those payment rows. `version` increases by one on every committed
/// mutation and backs the optimistic concurrency check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub id: ChargeId,
    pub student_id: StudentId,
    pub fee_id: FeeId,
    pub amount: Money,
    pub amount_paid: Money,
    pub status: ChargeStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub waived_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Charge {
    pub fn new(
        student_id: StudentId,
        fee_id: FeeId,
        amount: Money,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            fee_id,
            amount,
            amount_paid: Money::ZERO,
            status: ChargeStatus::Pending,
            notes,
            created_at,
            waived_at: None,
            version: 1,
        }
    }

    /// remaining balance; negative when overpaid
    pub fn balance(&self) -> Money {
        self.amount - self.amount_paid
    }

    pub fn is_waived(&self) -> bool {
        self.status == ChargeStatus::Waived
    }

    /// outstanding means a positive balance on a non-waived charge
    pub fn is_outstanding(&self) -> bool {
        !self.is_waived() && self.balance().is_positive()
    }

    /// apply a payment amount and rederive status
    pub fn apply_payment(&mut self, amount: Money) {
        self.amount_paid += amount;
        self.status = derive_status(self.amount, self.amount_paid, self.is_waived());
    }

    /// check the cached aggregate against the payment rows it summarizes
    pub fn assert_consistent(&self, payments: &[Payment]) {
        let recomputed: Money = payments
            .iter()
            .filter(|p| p.charge_id == self.id)
            .map(|p| p.amount)
            .sum();
        assert_eq!(
            self.amount_paid, recomputed,
            "charge {} amount_paid diverged from its payment rows",
            self.id
        );
        assert_eq!(
            self.status,
            derive_status(self.amount, self.amount_paid, self.is_waived()),
            "charge {} status diverged from its derivation",
            self.id
        );
    }
}

/// payment: a single receipt of money against exactly one charge.
/// append-only; the sole source of truth for money received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub student_id: StudentId,
    pub charge_id: ChargeId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub payment_date: DateTime<Utc>,
    pub request_id: Option<RequestId>,
}

impl Payment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        student_id: StudentId,
        charge_id: ChargeId,
        amount: Money,
        method: PaymentMethod,
        reference: Option<String>,
        notes: Option<String>,
        payment_date: DateTime<Utc>,
        request_id: Option<RequestId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            charge_id,
            amount,
            method,
            reference,
            notes,
            payment_date,
            request_id,
        }
    }
}
