use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    lifecycle::LifecycleState,
    sync_api::SyncError,
    sync_types::{OrderId, PaymentState},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Overrides the configured default for submitting the order blocked.
    pub block: Option<bool>,
}

impl SendOptions {
    pub fn blocked() -> Self {
        Self { block: Some(true) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub customer_reference: String,
    pub internal_reference: String,
    pub test: bool,
    pub blocked: bool,
}

/// Who asked for a status poll. Manual polls are chattier in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOrigin {
    Manual,
    Scheduled,
}

impl Display for PollOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollOrigin::Manual => write!(f, "manual"),
            PollOrigin::Scheduled => write!(f, "scheduled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    pub order_id: OrderId,
    pub status: String,
    pub lifecycle: LifecycleState,
    pub payment_state: PaymentState,
    /// Everything that changed, in the order it was noticed.
    pub changes: Vec<String>,
    /// The customer was sent the tracking details during this poll.
    pub notified: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PollSummary {
    pub polled: Vec<PollResult>,
    pub failures: Vec<(OrderId, SyncError)>,
}

impl PollSummary {
    pub fn total(&self) -> usize {
        self.polled.len() + self.failures.len()
    }
}

/// The last request and response exchanged with Infortisa for an order, verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExchange {
    pub payload: String,
    pub response: String,
}
