use infortisa_tools::InfortisaApiError;
use thiserror::Error;

use crate::{
    sync_types::{BillId, OrderId},
    traits::{AccountingError, NotificationError, StoreError},
};

#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Order {0} has already been sent to Infortisa")]
    AlreadySent(String),
    #[error("Infortisa returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("Infortisa rejected the request: {0}")]
    ProviderRejected(String),
    #[error("Infortisa could not be reached: {0}")]
    ProviderUnavailable(String),
    #[error("The customer has already been notified of the tracking details")]
    AlreadyNotified,
    #[error("There is no tracking URL for this order yet")]
    NoTracking,
    #[error("A vendor bill ({0}) already exists for this order")]
    BillAlreadyExists(BillId),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order store error: {0}")]
    Store(String),
    #[error("Accounting error: {0}")]
    Accounting(#[from] AccountingError),
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            StoreError::Backend(s) => Self::Store(s),
        }
    }
}

impl From<InfortisaApiError> for SyncError {
    fn from(e: InfortisaApiError) -> Self {
        use InfortisaApiError::*;
        match e {
            Initialization(_) | MissingApiKey | InvalidApiKey(_) => Self::Configuration(e.to_string()),
            Validation(s) => Self::Validation(s),
            XmlError(s) => Self::Validation(format!("Could not build the request document. {s}")),
            QueryError { status, body } => Self::Provider { status, body },
            ProviderError(body) => Self::ProviderRejected(body),
            RequestError(s) | ResponseError(s) => Self::ProviderUnavailable(s),
        }
    }
}
