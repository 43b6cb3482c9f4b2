use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a student
pub type StudentId = Uuid;

/// unique identifier for a fee template
pub type FeeId = Uuid;

/// unique identifier for a charge
pub type ChargeId = Uuid;

/// unique identifier for a payment
pub type PaymentId = Uuid;

/// idempotency key supplied by callers resubmitting an operation
pub type RequestId = Uuid;

/// unique identifier for a grade level
pub type GradeId = Uuid;

/// unique identifier for a class
pub type ClassId = Uuid;

/// fee categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeCategory {
    Tuition,
    Registration,
    Books,
    Trip,
    Event,
    Donation,
    Other,
}

impl FeeCategory {
    /// donations are collected but never owed
    pub fn is_owed(&self) -> bool {
        !matches!(self, FeeCategory::Donation)
    }
}

/// who a fee template applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeScope {
    SchoolWide,
    Grade { grade_id: GradeId },
    Class { class_id: ClassId },
}

/// charge lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    /// charged, nothing received yet
    Pending,
    /// some payment received, balance remains
    Partial,
    /// paid in full (or beyond)
    Paid,
    /// manually excused from collection
    Waived,
}

impl ChargeStatus {
    /// waived and paid charges accept no further payments via allocation
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChargeStatus::Paid | ChargeStatus::Waived)
    }
}

/// how a payment was received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Check,
    BankTransfer,
    Card,
    Other,
}

/// student set a bulk assignment targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentScope {
    /// all active students
    SchoolWide,
    /// active students in one grade
    Grade { grade_id: GradeId },
    /// active students in one class
    Class { class_id: ClassId },
}

/// academic-year filter for summaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearFilter {
    /// no filtering
    All,
    /// restrict to one academic year, e.g. "2025-2026"
    Year(String),
}

impl YearFilter {
    pub fn matches(&self, academic_year: &str) -> bool {
        match self {
            YearFilter::All => true,
            YearFilter::Year(year) => year == academic_year,
        }
    }
}
