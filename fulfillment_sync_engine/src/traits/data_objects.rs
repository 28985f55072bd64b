use fsg_common::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::sync_types::{
    AttachmentId,
    BankAccountId,
    BatchId,
    BillId,
    JournalId,
    MethodLineId,
    OrderId,
    PartnerId,
    PaymentId,
    PaymentMethodId,
    ProductId,
};

//--------------------------------------       Journals      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalKind {
    Purchase,
    Bank,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    pub id: JournalId,
    pub name: String,
    pub code: String,
    pub kind: JournalKind,
}

/// Search criteria for journals. All criteria that are set must match; `name_like` is a case-insensitive substring
/// match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalQuery {
    pub kind: Option<JournalKind>,
    pub code: Option<String>,
    pub name_like: Option<String>,
}

impl JournalQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: JournalKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_code<S: Into<String>>(mut self, code: S) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_name_like<S: Into<String>>(mut self, name: S) -> Self {
        self.name_like = Some(name.into());
        self
    }

    pub fn matches(&self, journal: &Journal) -> bool {
        self.kind.map(|k| k == journal.kind).unwrap_or(true) &&
            self.code.as_ref().map(|c| c == &journal.code).unwrap_or(true) &&
            self.name_like.as_ref().map(|n| contains_ignore_case(&journal.name, n)).unwrap_or(true)
    }
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

//--------------------------------------    Vendor bills     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillState {
    Draft,
    Posted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorBill {
    pub id: BillId,
    pub partner_id: PartnerId,
    pub journal_id: JournalId,
    pub state: BillState,
    /// Amount still to be paid.
    pub amount_residual: Money,
    pub currency: String,
    pub origin: String,
    pub payment_reference: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBillLine {
    pub name: String,
    pub quantity: Decimal,
    pub price_unit: Money,
    pub product_id: Option<ProductId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVendorBill {
    pub partner_id: PartnerId,
    pub journal_id: JournalId,
    /// The originating sales order name.
    pub origin: String,
    pub order_id: OrderId,
    pub currency: String,
    pub lines: Vec<NewBillLine>,
    /// Set on both the bill's payment reference and its reference.
    pub payment_reference: Option<String>,
}

impl NewVendorBill {
    pub fn total(&self) -> Money {
        self.lines.iter().map(|l| l.price_unit * l.quantity).sum()
    }
}

//--------------------------------------   Payment methods   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub name: String,
    pub code: String,
}

/// A payment method enabled on a specific journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodLine {
    pub id: MethodLineId,
    pub name: String,
    pub journal_id: JournalId,
    pub method_id: PaymentMethodId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: BankAccountId,
    pub partner_id: PartnerId,
    pub account_number: String,
}

//--------------------------------------      Payments       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorPayment {
    pub id: PaymentId,
    pub partner_id: PartnerId,
    pub amount: Money,
    pub currency: String,
    pub journal_id: JournalId,
    pub method_line_id: MethodLineId,
    pub bank_account_id: BankAccountId,
    pub memo: String,
    pub payment_reference: String,
    pub posted: bool,
    pub batch_id: Option<BatchId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVendorPayment {
    pub partner_id: PartnerId,
    pub amount: Money,
    pub currency: String,
    pub journal_id: JournalId,
    pub method_line_id: MethodLineId,
    pub bank_account_id: BankAccountId,
    /// Used for both the memo and the payment reference.
    pub reference: String,
}

//--------------------------------------  Settlement batches ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementBatch {
    pub id: BatchId,
    pub name: String,
    pub journal_id: JournalId,
    pub outbound: bool,
    pub method_id: PaymentMethodId,
    pub payment_ids: Vec<PaymentId>,
}

impl SettlementBatch {
    /// A payment can join a batch that pays out of the same journal with the same method.
    pub fn is_compatible_with(&self, query: &BatchQuery) -> bool {
        self.journal_id == query.journal_id && self.outbound == query.outbound && self.method_id == query.method_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchQuery {
    pub journal_id: JournalId,
    pub outbound: bool,
    pub method_id: PaymentMethodId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSettlementBatch {
    pub name: String,
    pub journal_id: JournalId,
    pub outbound: bool,
    pub method_id: PaymentMethodId,
    pub payment_ids: Vec<PaymentId>,
}

//--------------------------------------     Attachments     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachmentOwner {
    Batch(BatchId),
    Payment(PaymentId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub owner: AttachmentOwner,
    pub name: String,
    pub mimetype: String,
    /// Stored content. Hosts commonly keep files base64-encoded, so this may be either encoded or raw.
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn looks_like_xml(&self) -> bool {
        contains_ignore_case(&self.mimetype, "xml") || self.name.to_lowercase().ends_with(".xml")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttachment {
    pub name: String,
    pub mimetype: String,
    pub data: Vec<u8>,
}

/// A candidate settlement file as handed back by the accounting backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPayload {
    pub filename: Option<String>,
    pub content: ExportContent,
}

impl ExportPayload {
    pub fn bytes(content: Vec<u8>) -> Self {
        Self { filename: None, content: ExportContent::Bytes(content) }
    }

    pub fn text<S: Into<String>>(content: S) -> Self {
        Self { filename: None, content: ExportContent::Text(content.into()) }
    }

    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportContent {
    Bytes(Vec<u8>),
    Text(String),
}
