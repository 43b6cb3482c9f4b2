pub mod catalog;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod payments;
pub mod records;
pub mod status;
pub mod store;
pub mod summary;
pub mod types;

// re-export key types
pub use catalog::{FeeCatalog, InMemoryCatalog, InMemoryRoster, Roster, StudentRecord};
pub use config::{LedgerConfig, OverpaymentPolicy};
pub use decimal::Money;
pub use errors::{ErrorKind, LedgerError, Result};
pub use events::{Event, EventStore};
pub use ledger::{BulkAssignOutcome, FeeLedger};
pub use payments::{
    plan_allocation, AllocationPlan, AllocationResult, PaymentRecorder, PaymentRequest,
};
pub use records::{Charge, Fee, Payment};
pub use status::derive_status;
pub use store::{CommitOutcome, LedgerStore, LedgerWrite, MemoryStore, WriteBatch};
pub use summary::{summarize, FinancialSummary};
pub use types::{
    ChargeId, ChargeStatus, ClassId, FeeCategory, FeeId, FeeScope, GradeId, PaymentId,
    PaymentMethod, RequestId, StudentId, StudentScope, YearFilter,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
