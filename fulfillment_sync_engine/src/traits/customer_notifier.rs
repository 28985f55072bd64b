use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sync_types::{OrderId, PartnerId};

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("The order has no customer to notify")]
    NoRecipient,
    #[error("Could not deliver the notification: {0}")]
    DeliveryFailed(String),
}

/// A message telling the customer where to follow their shipment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingMessage {
    pub order_id: OrderId,
    pub recipient: PartnerId,
    pub recipient_email: Option<String>,
    pub subject: String,
    /// HTML body.
    pub body: String,
}

/// Delivers customer-facing messages through whatever channel the host uses (mail, chatter, SMS...).
#[allow(async_fn_in_trait)]
pub trait CustomerNotifier {
    async fn deliver(&self, message: &TrackingMessage) -> Result<(), NotificationError>;
}
