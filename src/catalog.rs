//! read-only seams onto the subsystems the ledger core does not own:
//! the fee-template catalog and the student roster. the in-memory
//! implementations back tests and embedded use.

use std::collections::HashMap;

use tracing::warn;

use crate::errors::{LedgerError, Result};
use crate::records::Fee;
use crate::types::{ClassId, FeeId, GradeId, StudentId, StudentScope};

/// fee-template lookups
pub trait FeeCatalog {
    fn fee(&self, id: FeeId) -> Result<Fee>;
}

/// roster lookups: active students per scope, family grouping per guardian
pub trait Roster {
    fn student_exists(&self, id: StudentId) -> bool;

    /// active students matching the scope, in stable roster order
    fn active_students(&self, scope: StudentScope) -> Vec<StudentId>;

    /// the student plus active siblings sharing the same guardian contact
    fn family(&self, student_id: StudentId) -> Result<Vec<StudentId>>;
}

/// in-memory fee catalog
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    fees: HashMap<FeeId, Fee>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, fee: Fee) -> FeeId {
        let id = fee.id;
        self.fees.insert(id, fee);
        id
    }
}

impl FeeCatalog for InMemoryCatalog {
    fn fee(&self, id: FeeId) -> Result<Fee> {
        self.fees.get(&id).cloned().ok_or_else(|| {
            warn!(fee_id = %id, "fee lookup miss");
            LedgerError::FeeNotFound { id }
        })
    }
}

/// roster entry for the in-memory roster
#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub id: StudentId,
    pub active: bool,
    pub grade_id: GradeId,
    pub class_id: ClassId,
    /// guardian contact key; students sharing it form a family
    pub guardian: String,
}

/// in-memory roster keeping insertion order stable
#[derive(Debug, Default)]
pub struct InMemoryRoster {
    students: Vec<StudentRecord>,
}

impl InMemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, student: StudentRecord) -> StudentId {
        let id = student.id;
        self.students.push(student);
        id
    }

    fn get(&self, id: StudentId) -> Option<&StudentRecord> {
        self.students.iter().find(|s| s.id == id)
    }
}

impl Roster for InMemoryRoster {
    fn student_exists(&self, id: StudentId) -> bool {
        self.get(id).is_some()
    }

    fn active_students(&self, scope: StudentScope) -> Vec<StudentId> {
        self.students
            .iter()
            .filter(|s| s.active)
            .filter(|s| match scope {
                StudentScope::SchoolWide => true,
                StudentScope::Grade { grade_id } => s.grade_id == grade_id,
                StudentScope::Class { class_id } => s.class_id == class_id,
            })
            .map(|s| s.id)
            .collect()
    }

    fn family(&self, student_id: StudentId) -> Result<Vec<StudentId>> {
        let student = self
            .get(student_id)
            .ok_or(LedgerError::StudentNotFound { id: student_id })?;

        Ok(self
            .students
            .iter()
            .filter(|s| s.active && s.guardian == student.guardian)
            .map(|s| s.id)
            .collect())
    }
}
