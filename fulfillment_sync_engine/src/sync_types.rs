use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use fsg_common::Money;
use infortisa_tools::{RequestLine, UNKNOWN_AGENT};
use log::error;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declares an integer record id owned by the host system.
macro_rules! record_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl $name {
            pub fn value(&self) -> i64 {
                self.0
            }
        }
    };
}

record_id!(OrderId, "#");
record_id!(PartnerId, "partner:");
record_id!(ProductId, "product:");
record_id!(JournalId, "journal:");
record_id!(BillId, "bill:");
record_id!(PaymentId, "payment:");
record_id!(PaymentMethodId, "method:");
record_id!(MethodLineId, "method_line:");
record_id!(BankAccountId, "bank_account:");
record_id!(BatchId, "batch:");
record_id!(AttachmentId, "attachment:");

//--------------------------------------    PaymentState     ---------------------------------------------------------
/// Progress of the vendor payment and its settlement export.
///
/// `Missing -> Posted -> ToExport -> Exported`, with any step able to fall into `Failed`. `ToExport` is retryable on
/// the next poll; `Failed` needs an operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// No payment yet, or financial follow-up is blocked.
    #[default]
    Missing,
    /// The payment is posted but the settlement file could not be produced yet.
    ToExport,
    /// The settlement file is attached to the batch.
    Exported,
    /// The payment is posted.
    Posted,
    Failed,
}

impl Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentState::Missing => write!(f, "missing"),
            PaymentState::ToExport => write!(f, "to_export"),
            PaymentState::Exported => write!(f, "exported"),
            PaymentState::Posted => write!(f, "posted"),
            PaymentState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid payment state: {0}")]
pub struct ConversionError(String);

impl FromStr for PaymentState {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "missing" => Ok(Self::Missing),
            "to_export" => Ok(Self::ToExport),
            "exported" => Ok(Self::Exported),
            "posted" => Ok(Self::Posted),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

impl From<String> for PaymentState {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment state: {value}. But this conversion cannot fail. Defaulting to missing");
            PaymentState::Missing
        })
    }
}

//--------------------------------------   ProviderAmounts   ---------------------------------------------------------
/// Financial breakdown as last reported by Infortisa. Every field is overwritten on each successful poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAmounts {
    /// Sum of the pre-canon line prices times quantities.
    pub base: Money,
    pub canon_op: Money,
    pub other_op: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

//--------------------------------------    TrackingState    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingState {
    pub url: String,
    pub number: String,
    pub status: String,
    pub status_detail: String,
    pub agent: String,
    /// Set once the customer has been told about the tracking URL by the automatic path. Never reset.
    pub notified: bool,
}

impl Default for TrackingState {
    fn default() -> Self {
        Self {
            url: String::new(),
            number: String::new(),
            status: String::new(),
            status_detail: String::new(),
            agent: UNKNOWN_AGENT.to_string(),
            notified: false,
        }
    }
}

//--------------------------------------    OrderSnapshot    ---------------------------------------------------------
/// The local copy of what Infortisa knows about an order, plus the links to the financial artifacts created from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    /// Correlation key sent to Infortisa. Immutable once the order has been sent.
    pub customer_reference: String,
    /// Infortisa's own id. Only ever written when it is still empty.
    pub internal_reference: String,
    /// Lifecycle code, `<PREFIX>/<rest>`.
    pub op_code: String,
    pub status_text: String,
    pub amounts: ProviderAmounts,
    pub transfer_ref: String,
    pub tracking: TrackingState,
    pub sent: bool,
    pub payment_state: PaymentState,
    pub allowed: bool,
    pub vendor_bill_id: Option<BillId>,
    pub vendor_payment_id: Option<PaymentId>,
    pub last_payload: String,
    pub last_response: String,
    pub products_summary: String,
    pub last_polled_at: Option<DateTime<Utc>>,
}

//--------------------------------------  CustomerContact    ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContact {
    pub partner_id: PartnerId,
    pub name: String,
    pub email: Option<String>,
}

//--------------------------------------      OrderLine      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: Option<String>,
    pub quantity: Decimal,
    /// Section headers and notes. They carry no product.
    pub is_section: bool,
    pub is_delivery: bool,
    /// Sellers listed on the line's product.
    pub vendors: Vec<PartnerId>,
}

impl OrderLine {
    pub fn product(sku: &str, quantity: i64, vendors: &[PartnerId]) -> Self {
        Self {
            sku: Some(sku.to_string()),
            quantity: Decimal::from(quantity),
            is_section: false,
            is_delivery: false,
            vendors: vendors.to_vec(),
        }
    }

    pub fn section() -> Self {
        Self { sku: None, quantity: Decimal::ZERO, is_section: true, is_delivery: false, vendors: Vec::new() }
    }

    pub fn delivery(sku: &str) -> Self {
        Self {
            sku: Some(sku.to_string()),
            quantity: Decimal::ONE,
            is_section: false,
            is_delivery: true,
            vendors: Vec::new(),
        }
    }

    pub fn is_supplied_by(&self, vendor: PartnerId) -> bool {
        !self.is_section && !self.is_delivery && self.vendors.contains(&vendor)
    }

    pub fn to_request_line(&self) -> RequestLine {
        RequestLine {
            sku: self.sku.clone(),
            quantity: self.quantity,
            is_section: self.is_section,
            is_delivery: self.is_delivery,
        }
    }
}

//--------------------------------------     SalesOrder      ---------------------------------------------------------
/// A sales order as held by the host system, with its synchronisation snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: OrderId,
    /// Human-readable order name, e.g. `S00042`.
    pub name: String,
    /// Free-text note, may contain HTML.
    pub note: String,
    pub currency: String,
    pub customer: Option<CustomerContact>,
    pub lines: Vec<OrderLine>,
    pub sync: OrderSnapshot,
}

impl SalesOrder {
    /// True iff at least one real product line lists `vendor` among its sellers.
    pub fn is_supplied_by(&self, vendor: Option<PartnerId>) -> bool {
        match vendor {
            Some(vendor) => self.lines.iter().any(|l| l.is_supplied_by(vendor)),
            None => false,
        }
    }

    /// The correlation key to use if none has been assigned yet: the order name without slashes or spaces.
    pub fn default_customer_reference(&self) -> String {
        self.name.chars().filter(|c| *c != '/' && *c != ' ').collect()
    }

    pub fn request_lines(&self) -> Vec<RequestLine> {
        self.lines.iter().map(OrderLine::to_request_line).collect()
    }
}
