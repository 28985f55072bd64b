use thiserror::Error;

use crate::sync_types::{OrderId, OrderSnapshot, SalesOrder};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Access to the host's sales orders and their synchronisation snapshots.
///
/// The store is expected to provide per-order atomic writes. Concurrent synchronisation of the same order must be
/// prevented by the caller.
#[allow(async_fn_in_trait)]
pub trait OrderStore {
    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<SalesOrder>, StoreError>;

    /// Orders that have been sent to Infortisa and are still eligible for synchronisation.
    async fn fetch_pollable_orders(&self) -> Result<Vec<SalesOrder>, StoreError>;

    /// Overwrites the stored snapshot for the order.
    async fn save_snapshot(&self, order_id: OrderId, snapshot: &OrderSnapshot) -> Result<(), StoreError>;

    /// Appends a human-readable audit note to the order.
    async fn post_note(&self, order_id: OrderId, note: &str) -> Result<(), StoreError>;
}
