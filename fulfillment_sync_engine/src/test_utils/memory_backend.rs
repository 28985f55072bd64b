use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use log::*;

use crate::{
    sync_types::{
        AttachmentId,
        BankAccountId,
        BatchId,
        BillId,
        JournalId,
        MethodLineId,
        OrderId,
        OrderSnapshot,
        PartnerId,
        PaymentId,
        PaymentMethodId,
        SalesOrder,
    },
    traits::{
        data_objects::*,
        AccountingBackend,
        AccountingError,
        CustomerNotifier,
        NotificationError,
        OrderStore,
        ResolvedShipping,
        ShippingAddressResolver,
        StoreError,
        TrackingMessage,
    },
};

/// What the backend hands back when the engine looks for a settlement file.
#[derive(Debug, Clone, Default)]
pub struct ExportBehaviour {
    pub generated: Option<ExportPayload>,
    pub fail_generation: bool,
    pub batch_fields: Vec<ExportPayload>,
    pub regenerated: Option<ExportPayload>,
}

#[derive(Debug, Default)]
pub struct MemoryState {
    next_id: i64,
    pub orders: BTreeMap<OrderId, SalesOrder>,
    pub notes: Vec<(OrderId, String)>,
    pub journals: Vec<Journal>,
    pub bills: BTreeMap<BillId, VendorBill>,
    pub bill_requests: Vec<NewVendorBill>,
    pub payment_methods: Vec<PaymentMethod>,
    pub method_lines: Vec<PaymentMethodLine>,
    pub bank_accounts: Vec<BankAccount>,
    pub payments: BTreeMap<PaymentId, VendorPayment>,
    pub reconciled: Vec<(PaymentId, BillId)>,
    pub batches: BTreeMap<BatchId, SettlementBatch>,
    pub attachments: Vec<Attachment>,
    pub messages: Vec<TrackingMessage>,
    pub shipping: ResolvedShipping,
    pub export: ExportBehaviour,
    pub fail_notifications: bool,
    pub fail_payment_posting: bool,
    pub fail_reconciliation: bool,
    pub fail_bill_posting: bool,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// An in-memory host: orders, audit notes, accounting records and a customer outbox. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_order(&self, order: SalesOrder) {
        self.state().orders.insert(order.id, order);
    }

    pub fn order(&self, id: OrderId) -> Option<SalesOrder> {
        self.state().orders.get(&id).cloned()
    }

    pub fn snapshot(&self, id: OrderId) -> OrderSnapshot {
        self.order(id).map(|o| o.sync).unwrap_or_default()
    }

    pub fn notes_for(&self, id: OrderId) -> Vec<String> {
        self.state().notes.iter().filter(|(o, _)| *o == id).map(|(_, n)| n.clone()).collect()
    }

    pub fn messages(&self) -> Vec<TrackingMessage> {
        self.state().messages.clone()
    }

    pub fn add_journal(&self, name: &str, code: &str, kind: JournalKind) -> JournalId {
        let mut state = self.state();
        let id = JournalId(state.next_id());
        state.journals.push(Journal { id, name: name.to_string(), code: code.to_string(), kind });
        id
    }

    pub fn add_payment_method(&self, name: &str, code: &str) -> PaymentMethodId {
        let mut state = self.state();
        let id = PaymentMethodId(state.next_id());
        state.payment_methods.push(PaymentMethod { id, name: name.to_string(), code: code.to_string() });
        id
    }

    pub fn add_method_line(&self, journal_id: JournalId, method_id: PaymentMethodId, name: &str) -> MethodLineId {
        let mut state = self.state();
        let id = MethodLineId(state.next_id());
        state.method_lines.push(PaymentMethodLine { id, name: name.to_string(), journal_id, method_id });
        id
    }

    pub fn add_bank_account(&self, partner_id: PartnerId, account_number: &str) -> BankAccountId {
        let mut state = self.state();
        let id = BankAccountId(state.next_id());
        state.bank_accounts.push(BankAccount { id, partner_id, account_number: account_number.to_string() });
        id
    }

    /// A purchase journal, a `BNK5` bank journal with a SEPA method line, and a bank account for `vendor`.
    pub fn with_standard_accounting(self, vendor: PartnerId) -> Self {
        self.add_journal("Purchases", "BILL", JournalKind::Purchase);
        let bank = self.add_journal("Banco Principal", "BNK5", JournalKind::Bank);
        let method = self.add_payment_method("SEPA Credit Transfer", "sepa_ct");
        self.add_method_line(bank, method, "SEPA Credit Transfer");
        self.add_bank_account(vendor, "ES91 2100 0418 4502 0005 1332");
        self
    }

    pub fn set_export(&self, export: ExportBehaviour) {
        self.state().export = export;
    }
}

//--------------------------------------     OrderStore      ---------------------------------------------------------
impl OrderStore for MemoryBackend {
    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<SalesOrder>, StoreError> {
        Ok(self.order(order_id))
    }

    async fn fetch_pollable_orders(&self) -> Result<Vec<SalesOrder>, StoreError> {
        Ok(self.state().orders.values().filter(|o| o.sync.sent && o.sync.allowed).cloned().collect())
    }

    async fn save_snapshot(&self, order_id: OrderId, snapshot: &OrderSnapshot) -> Result<(), StoreError> {
        let mut state = self.state();
        let order = state.orders.get_mut(&order_id).ok_or(StoreError::OrderNotFound(order_id))?;
        order.sync = snapshot.clone();
        Ok(())
    }

    async fn post_note(&self, order_id: OrderId, note: &str) -> Result<(), StoreError> {
        trace!("🗒️ [{order_id}] {note}");
        self.state().notes.push((order_id, note.to_string()));
        Ok(())
    }
}

//--------------------------------------  CustomerNotifier   ---------------------------------------------------------
impl CustomerNotifier for MemoryBackend {
    async fn deliver(&self, message: &TrackingMessage) -> Result<(), NotificationError> {
        let mut state = self.state();
        if state.fail_notifications {
            return Err(NotificationError::DeliveryFailed("Outbox is unavailable".to_string()));
        }
        state.messages.push(message.clone());
        Ok(())
    }
}

impl ShippingAddressResolver for MemoryBackend {
    async fn resolve_shipping(&self, _order: &SalesOrder) -> ResolvedShipping {
        self.state().shipping.clone()
    }
}

//--------------------------------------  AccountingBackend  ---------------------------------------------------------
fn not_found<T: std::fmt::Display>(what: T) -> AccountingError {
    AccountingError::NotFound(what.to_string())
}

impl AccountingBackend for MemoryBackend {
    async fn fetch_journal(&self, journal_id: JournalId) -> Result<Option<Journal>, AccountingError> {
        Ok(self.state().journals.iter().find(|j| j.id == journal_id).cloned())
    }

    async fn search_journal(&self, query: &JournalQuery) -> Result<Option<Journal>, AccountingError> {
        Ok(self.state().journals.iter().find(|j| query.matches(j)).cloned())
    }

    async fn fetch_bill(&self, bill_id: BillId) -> Result<Option<VendorBill>, AccountingError> {
        Ok(self.state().bills.get(&bill_id).cloned())
    }

    async fn create_bill(&self, bill: NewVendorBill) -> Result<VendorBill, AccountingError> {
        let mut state = self.state();
        let id = BillId(state.next_id());
        let reference = bill.payment_reference.clone().unwrap_or_default();
        let created = VendorBill {
            id,
            partner_id: bill.partner_id,
            journal_id: bill.journal_id,
            state: BillState::Draft,
            amount_residual: bill.total(),
            currency: bill.currency.clone(),
            origin: bill.origin.clone(),
            payment_reference: reference.clone(),
            reference,
        };
        state.bill_requests.push(bill);
        state.bills.insert(id, created.clone());
        Ok(created)
    }

    async fn post_bill(&self, bill_id: BillId) -> Result<VendorBill, AccountingError> {
        let mut state = self.state();
        if state.fail_bill_posting {
            return Err(AccountingError::Rejected("The bill is missing a date".to_string()));
        }
        let bill = state.bills.get_mut(&bill_id).ok_or_else(|| not_found(bill_id))?;
        bill.state = BillState::Posted;
        Ok(bill.clone())
    }

    async fn set_bill_reference(&self, bill_id: BillId, reference: &str) -> Result<(), AccountingError> {
        let mut state = self.state();
        let bill = state.bills.get_mut(&bill_id).ok_or_else(|| not_found(bill_id))?;
        bill.payment_reference = reference.to_string();
        bill.reference = reference.to_string();
        Ok(())
    }

    async fn search_method_line(
        &self,
        journal_id: JournalId,
        name_patterns: &[&str],
    ) -> Result<Option<PaymentMethodLine>, AccountingError> {
        Ok(self
            .state()
            .method_lines
            .iter()
            .find(|l| l.journal_id == journal_id && name_patterns.iter().any(|p| contains_ignore_case(&l.name, p)))
            .cloned())
    }

    async fn search_payment_method(&self, codes: &[&str]) -> Result<Option<PaymentMethod>, AccountingError> {
        Ok(self.state().payment_methods.iter().find(|m| codes.contains(&m.code.as_str())).cloned())
    }

    async fn create_method_line(
        &self,
        journal_id: JournalId,
        method: &PaymentMethod,
    ) -> Result<PaymentMethodLine, AccountingError> {
        let mut state = self.state();
        let line = PaymentMethodLine {
            id: MethodLineId(state.next_id()),
            name: method.name.clone(),
            journal_id,
            method_id: method.id,
        };
        state.method_lines.push(line.clone());
        Ok(line)
    }

    async fn fetch_vendor_bank_account(&self, partner_id: PartnerId) -> Result<Option<BankAccount>, AccountingError> {
        Ok(self.state().bank_accounts.iter().find(|a| a.partner_id == partner_id).cloned())
    }

    async fn fetch_payment(&self, payment_id: PaymentId) -> Result<Option<VendorPayment>, AccountingError> {
        Ok(self.state().payments.get(&payment_id).cloned())
    }

    async fn create_payment(&self, payment: NewVendorPayment) -> Result<VendorPayment, AccountingError> {
        let mut state = self.state();
        let created = VendorPayment {
            id: PaymentId(state.next_id()),
            partner_id: payment.partner_id,
            amount: payment.amount,
            currency: payment.currency,
            journal_id: payment.journal_id,
            method_line_id: payment.method_line_id,
            bank_account_id: payment.bank_account_id,
            memo: payment.reference.clone(),
            payment_reference: payment.reference,
            posted: false,
            batch_id: None,
        };
        state.payments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_payment_reference(&self, payment_id: PaymentId, reference: &str) -> Result<(), AccountingError> {
        let mut state = self.state();
        let payment = state.payments.get_mut(&payment_id).ok_or_else(|| not_found(payment_id))?;
        payment.memo = reference.to_string();
        payment.payment_reference = reference.to_string();
        Ok(())
    }

    async fn post_payment(&self, payment_id: PaymentId) -> Result<VendorPayment, AccountingError> {
        let mut state = self.state();
        if state.fail_payment_posting {
            return Err(AccountingError::Rejected("The payment journal is locked".to_string()));
        }
        let payment = state.payments.get_mut(&payment_id).ok_or_else(|| not_found(payment_id))?;
        payment.posted = true;
        Ok(payment.clone())
    }

    async fn reconcile_payment(&self, payment_id: PaymentId, bill_id: BillId) -> Result<(), AccountingError> {
        let mut state = self.state();
        if state.fail_reconciliation {
            return Err(AccountingError::Rejected("Nothing to reconcile".to_string()));
        }
        state.reconciled.push((payment_id, bill_id));
        Ok(())
    }

    async fn fetch_batch(&self, batch_id: BatchId) -> Result<Option<SettlementBatch>, AccountingError> {
        Ok(self.state().batches.get(&batch_id).cloned())
    }

    async fn search_open_batch(&self, query: &BatchQuery) -> Result<Option<SettlementBatch>, AccountingError> {
        Ok(self.state().batches.values().find(|b| b.is_compatible_with(query)).cloned())
    }

    async fn create_batch(&self, batch: NewSettlementBatch) -> Result<SettlementBatch, AccountingError> {
        let mut state = self.state();
        let created = SettlementBatch {
            id: BatchId(state.next_id()),
            name: batch.name,
            journal_id: batch.journal_id,
            outbound: batch.outbound,
            method_id: batch.method_id,
            payment_ids: batch.payment_ids,
        };
        state.batches.insert(created.id, created.clone());
        Ok(created)
    }

    async fn add_payment_to_batch(&self, batch_id: BatchId, payment_id: PaymentId) -> Result<(), AccountingError> {
        let mut state = self.state();
        let batch = state.batches.get_mut(&batch_id).ok_or_else(|| not_found(batch_id))?;
        if !batch.payment_ids.contains(&payment_id) {
            batch.payment_ids.push(payment_id);
        }
        let payment = state.payments.get_mut(&payment_id).ok_or_else(|| not_found(payment_id))?;
        payment.batch_id = Some(batch_id);
        Ok(())
    }

    async fn generate_export_file(&self, batch_id: BatchId) -> Result<Option<ExportPayload>, AccountingError> {
        let state = self.state();
        if state.export.fail_generation {
            return Err(AccountingError::Rejected(format!("Batch {batch_id} cannot be validated")));
        }
        Ok(state.export.generated.clone())
    }

    async fn batch_export_fields(&self, _batch_id: BatchId) -> Result<Vec<ExportPayload>, AccountingError> {
        Ok(self.state().export.batch_fields.clone())
    }

    async fn regenerate_export_file(&self, _batch_id: BatchId) -> Result<Option<ExportPayload>, AccountingError> {
        Ok(self.state().export.regenerated.clone())
    }

    async fn list_xml_attachments(&self, owner: AttachmentOwner) -> Result<Vec<Attachment>, AccountingError> {
        Ok(self.state().attachments.iter().rev().filter(|a| a.owner == owner && a.looks_like_xml()).cloned().collect())
    }

    async fn find_attachment(&self, owner: AttachmentOwner, name: &str) -> Result<Option<Attachment>, AccountingError> {
        Ok(self.state().attachments.iter().find(|a| a.owner == owner && a.name == name).cloned())
    }

    async fn create_attachment(
        &self,
        owner: AttachmentOwner,
        attachment: NewAttachment,
    ) -> Result<Attachment, AccountingError> {
        let mut state = self.state();
        let created = Attachment {
            id: AttachmentId(state.next_id()),
            owner,
            name: attachment.name,
            mimetype: attachment.mimetype,
            data: attachment.data,
        };
        state.attachments.push(created.clone());
        Ok(created)
    }
}
