//! Fulfillment Sync Engine
//!
//! Keeps a merchant's sales orders in step with the Infortisa fulfillment service. Orders are submitted to Infortisa,
//! their status is polled, and the figures Infortisa reports are reconciled against a local snapshot. Once Infortisa
//! marks an order as payable, the engine bills and pays it; once a tracking link turns up, the customer is told about
//! it, exactly once.
//!
//! The library is provider-facing on one side and host-agnostic on the other:
//! 1. The wire format and HTTP client live in `infortisa_tools`. The engine reaches Infortisa through the
//!    [`traits::FulfillmentProvider`] trait.
//! 2. Orders, accounting records and customer messaging belong to the host. The engine reaches them through the traits
//!    in [`mod@traits`], bundled as [`traits::SyncBackend`].
//!
//! [`FulfillmentSyncApi`] is the public entry point. [`poll_worker`] runs the periodic status poll.
pub mod billing;
pub mod config;
pub mod lifecycle;
pub mod poll_worker;
pub mod reconcile;
pub mod settlement;
pub mod summary;
pub mod sync_types;
pub mod tracking;
pub mod traits;

mod sync_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use config::SyncConfig;
pub use lifecycle::LifecycleState;
pub use sync_api::{
    FulfillmentSyncApi,
    PollOrigin,
    PollResult,
    PollSummary,
    RawExchange,
    SendOptions,
    SendResult,
    SyncError,
};
