use thiserror::Error;

use crate::{
    sync_types::{BatchId, BillId, JournalId, PartnerId, PaymentId},
    traits::data_objects::{
        Attachment,
        AttachmentOwner,
        BankAccount,
        BatchQuery,
        ExportPayload,
        Journal,
        JournalQuery,
        NewAttachment,
        NewSettlementBatch,
        NewVendorBill,
        NewVendorPayment,
        PaymentMethod,
        PaymentMethodLine,
        SettlementBatch,
        VendorBill,
        VendorPayment,
    },
};

#[derive(Debug, Clone, Error)]
pub enum AccountingError {
    #[error("Accounting record not found: {0}")]
    NotFound(String),
    #[error("The accounting backend rejected the operation: {0}")]
    Rejected(String),
    #[error("Accounting backend error: {0}")]
    Backend(String),
}

/// The capabilities of the host's accounting system that the settlement flow relies on.
///
/// Every call is independently failable. The engine checks for existing links before every create call, but the
/// backend should still make creation atomic per order.
#[allow(async_fn_in_trait)]
pub trait AccountingBackend {
    // ---------------------------------------------   Journals   ----------------------------------------------------
    async fn fetch_journal(&self, journal_id: JournalId) -> Result<Option<Journal>, AccountingError>;

    /// Returns the first journal matching the query.
    async fn search_journal(&self, query: &JournalQuery) -> Result<Option<Journal>, AccountingError>;

    // ---------------------------------------------    Bills     ----------------------------------------------------
    async fn fetch_bill(&self, bill_id: BillId) -> Result<Option<VendorBill>, AccountingError>;

    async fn create_bill(&self, bill: NewVendorBill) -> Result<VendorBill, AccountingError>;

    async fn post_bill(&self, bill_id: BillId) -> Result<VendorBill, AccountingError>;

    /// Sets both the payment reference and the reference of the bill.
    async fn set_bill_reference(&self, bill_id: BillId, reference: &str) -> Result<(), AccountingError>;

    // ---------------------------------------------   Payments   ----------------------------------------------------
    /// Finds an outbound payment method line on the journal whose name contains any of `name_patterns`.
    async fn search_method_line(
        &self,
        journal_id: JournalId,
        name_patterns: &[&str],
    ) -> Result<Option<PaymentMethodLine>, AccountingError>;

    /// Finds an outbound payment method whose code is one of `codes`.
    async fn search_payment_method(&self, codes: &[&str]) -> Result<Option<PaymentMethod>, AccountingError>;

    async fn create_method_line(
        &self,
        journal_id: JournalId,
        method: &PaymentMethod,
    ) -> Result<PaymentMethodLine, AccountingError>;

    async fn fetch_vendor_bank_account(&self, partner_id: PartnerId) -> Result<Option<BankAccount>, AccountingError>;

    async fn fetch_payment(&self, payment_id: PaymentId) -> Result<Option<VendorPayment>, AccountingError>;

    async fn create_payment(&self, payment: NewVendorPayment) -> Result<VendorPayment, AccountingError>;

    /// Sets both the memo and the payment reference of the payment.
    async fn update_payment_reference(&self, payment_id: PaymentId, reference: &str) -> Result<(), AccountingError>;

    async fn post_payment(&self, payment_id: PaymentId) -> Result<VendorPayment, AccountingError>;

    /// Reconciles the payment against the payable lines of the bill.
    async fn reconcile_payment(&self, payment_id: PaymentId, bill_id: BillId) -> Result<(), AccountingError>;

    // ---------------------------------------------   Batches    ----------------------------------------------------
    async fn fetch_batch(&self, batch_id: BatchId) -> Result<Option<SettlementBatch>, AccountingError>;

    /// Finds an open batch that a payment matching `query` could join.
    async fn search_open_batch(&self, query: &BatchQuery) -> Result<Option<SettlementBatch>, AccountingError>;

    async fn create_batch(&self, batch: NewSettlementBatch) -> Result<SettlementBatch, AccountingError>;

    async fn add_payment_to_batch(&self, batch_id: BatchId, payment_id: PaymentId) -> Result<(), AccountingError>;

    /// Validates the batch and asks for its settlement file. The file may not be ready, in which case `None` is
    /// returned.
    async fn generate_export_file(&self, batch_id: BatchId) -> Result<Option<ExportPayload>, AccountingError>;

    /// Export files that the batch exposes as fields, in the backend's order of preference.
    async fn batch_export_fields(&self, batch_id: BatchId) -> Result<Vec<ExportPayload>, AccountingError>;

    /// Explicitly rebuilds the settlement file.
    async fn regenerate_export_file(&self, batch_id: BatchId) -> Result<Option<ExportPayload>, AccountingError>;

    // ---------------------------------------------  Attachments ----------------------------------------------------
    /// XML attachments of the owner, newest first.
    async fn list_xml_attachments(&self, owner: AttachmentOwner) -> Result<Vec<Attachment>, AccountingError>;

    async fn find_attachment(&self, owner: AttachmentOwner, name: &str) -> Result<Option<Attachment>, AccountingError>;

    async fn create_attachment(
        &self,
        owner: AttachmentOwner,
        attachment: NewAttachment,
    ) -> Result<Attachment, AccountingError>;
}
