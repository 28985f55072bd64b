//! #  Host collaborators
//!
//! The synchronisation engine does not own any storage. Everything it reads or writes lives in the host system and is
//! reached through the traits in this module.
//!
//! ## Traits
//! * [`OrderStore`] gives access to sales orders, their synchronisation snapshots and the audit trail.
//! * [`AccountingBackend`] exposes the journals, vendor bills, payments, settlement batches and attachments needed to
//!   pay Infortisa once an order becomes payable.
//! * [`CustomerNotifier`] delivers tracking messages to customers.
//! * [`ShippingAddressResolver`] decides where an order ships to.
//! * [`FulfillmentProvider`] is the remote side. [`infortisa_tools::InfortisaApi`] implements it.
//!
//! [`SyncBackend`] bundles the four host traits so that the engine can be parameterised over a single type.
mod accounting;
mod customer_notifier;
mod order_store;
mod provider;
mod shipping;

pub mod data_objects;

pub use accounting::{AccountingBackend, AccountingError};
pub use customer_notifier::{CustomerNotifier, NotificationError, TrackingMessage};
pub use order_store::{OrderStore, StoreError};
pub use provider::FulfillmentProvider;
pub use shipping::{ResolvedShipping, ShippingAddressResolver};

/// Everything the engine needs from the host system.
pub trait SyncBackend: OrderStore + AccountingBackend + CustomerNotifier + ShippingAddressResolver {}

impl<T> SyncBackend for T where T: OrderStore + AccountingBackend + CustomerNotifier + ShippingAddressResolver {}
