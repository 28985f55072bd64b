//! # Fulfillment synchronisation API
//!
//! [`FulfillmentSyncApi`] is the entry point for everything the host does with Infortisa: sending orders, polling
//! their status, blocking and cancelling them, billing and paying for them, and telling customers about their
//! shipments.
//!
//! The API is created from a [`crate::traits::FulfillmentProvider`] (usually [`infortisa_tools::InfortisaApi`]), a
//! host backend implementing [`crate::traits::SyncBackend`], and a [`crate::SyncConfig`].
//!
//! ```rust,ignore
//! let provider = InfortisaApi::new(InfortisaConfig::new_from_env_or_default())?;
//! let api = FulfillmentSyncApi::new(provider, host_backend, SyncConfig::from_env_or_default());
//! api.send_order(order_id, SendOptions::default()).await?;
//! let result = api.poll_status(order_id, PollOrigin::Manual).await?;
//! ```
mod errors;
mod fulfillment_sync_api;
mod sync_objects;

pub use errors::SyncError;
pub use fulfillment_sync_api::FulfillmentSyncApi;
pub use sync_objects::{PollOrigin, PollResult, PollSummary, RawExchange, SendOptions, SendResult};
