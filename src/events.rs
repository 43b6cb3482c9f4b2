use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{ChargeId, ChargeStatus, FeeId, PaymentId, StudentId};

/// all events that can be emitted by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // charge lifecycle events
    ChargeCreated {
        charge_id: ChargeId,
        student_id: StudentId,
        fee_id: FeeId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    FeeBulkAssigned {
        fee_id: FeeId,
        assigned: usize,
        skipped: usize,
        timestamp: DateTime<Utc>,
    },
    ChargeWaived {
        charge_id: ChargeId,
        amount_outstanding: Money,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentRecorded {
        payment_id: PaymentId,
        charge_id: ChargeId,
        student_id: StudentId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    AllocationApplied {
        total: Money,
        charges_touched: usize,
        leftover: Money,
        timestamp: DateTime<Utc>,
    },

    // status change events
    StatusChanged {
        charge_id: ChargeId,
        old_status: ChargeStatus,
        new_status: ChargeStatus,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
