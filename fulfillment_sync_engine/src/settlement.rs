//! Paying Infortisa once an order becomes payable.
//!
//! The sequence is: post the vendor bill if needed, find a bank journal and an ISO 20022 / SEPA payment method, create
//! and post the vendor payment, reconcile it with the bill, put it in a settlement batch, and attach the batch's
//! settlement file. Every step returns a `Result`; [`SettlementError::resulting_state`] says what the order's payment
//! state becomes when a step fails.
use log::*;
use thiserror::Error;

use crate::{
    config::SyncConfig,
    lifecycle::LifecycleState,
    sync_types::{BatchId, BillId, JournalId, OrderSnapshot, PartnerId, PaymentId, PaymentState, SalesOrder},
    traits::{
        data_objects::{
            AttachmentOwner,
            BatchQuery,
            BillState,
            ExportContent,
            ExportPayload,
            Journal,
            JournalKind,
            JournalQuery,
            NewAttachment,
            NewSettlementBatch,
            NewVendorPayment,
            PaymentMethodLine,
            SettlementBatch,
            VendorBill,
            VendorPayment,
        },
        AccountingBackend,
        AccountingError,
    },
};

pub const DEFAULT_BANK_JOURNAL_CODE: &str = "BNK5";
pub const BANK_JOURNAL_NAME_HINT: &str = "Banco";
pub const METHOD_LINE_NAME_PATTERNS: [&str; 2] = ["ISO20022", "SEPA"];
pub const PAYMENT_METHOD_CODES: [&str; 3] = ["iso20022", "sepa_ct", "sepa_credit_transfer"];
pub const XML_PROLOG: &[u8] = b"<?xml";
const XML_MIMETYPE: &str = "application/xml";

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Financial follow-up is blocked while the Infortisa code is {0}")]
    Blocked(String),
    #[error("Vendor bill {0} does not exist")]
    BillNotFound(BillId),
    #[error("Could not post vendor bill {0}. {1}")]
    BillNotPosted(BillId, String),
    #[error("No bank journal is available to pay Infortisa")]
    NoBankJournal,
    #[error("No ISO 20022 or SEPA payment method is available on journal {0}")]
    NoPaymentMethod(JournalId),
    #[error("The vendor {0} has no bank account")]
    NoVendorBankAccount(PartnerId),
    #[error("Could not post vendor payment {0}. {1}")]
    PaymentNotPosted(PaymentId, String),
    #[error("Settlement file generation failed for batch {0}. {1}")]
    ExportFailed(BatchId, String),
    #[error("{0}")]
    Accounting(#[from] AccountingError),
}

impl SettlementError {
    /// The payment state an order ends up in when settlement stops with this error.
    pub fn resulting_state(&self) -> PaymentState {
        match self {
            SettlementError::Blocked(_) => PaymentState::Missing,
            _ => PaymentState::Failed,
        }
    }
}

/// Reasons to stop without touching the payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoBill,
    BillCancelled,
    NoTransferReference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Skipped(SkipReason),
    /// The payment is posted. `state` is [`PaymentState::Exported`] if the settlement file is attached, or
    /// [`PaymentState::ToExport`] if it is not available yet.
    Settled { payment_id: PaymentId, batch_id: BatchId, state: PaymentState },
}

/// Places where a settlement file may turn up after generation has been requested, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportSource {
    GenerationResult,
    BatchFields,
    BatchAttachments,
    PaymentAttachments,
    Regeneration,
}

pub const EXPORT_SOURCES: [ExportSource; 5] = [
    ExportSource::GenerationResult,
    ExportSource::BatchFields,
    ExportSource::BatchAttachments,
    ExportSource::PaymentAttachments,
    ExportSource::Regeneration,
];

/// A settlement file that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub filename: Option<String>,
    pub xml: Vec<u8>,
}

/// Returns the XML content of the payload if it is a settlement file. Base64 is tried first, since that is how hosts
/// usually store binary fields; otherwise the content is taken as is.
pub fn decode_export_candidate(payload: &ExportPayload) -> Option<ExportFile> {
    let raw = match &payload.content {
        ExportContent::Bytes(b) => b.as_slice(),
        ExportContent::Text(s) => s.as_bytes(),
    };
    if raw.is_empty() {
        return None;
    }
    let compact = raw.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect::<Vec<u8>>();
    let xml = match base64::decode(&compact) {
        Ok(decoded) if is_xml(&decoded) => decoded,
        _ if is_xml(raw) => raw.to_vec(),
        _ => return None,
    };
    Some(ExportFile { filename: payload.filename.clone().filter(|f| !f.trim().is_empty()), xml })
}

fn is_xml(bytes: &[u8]) -> bool {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    bytes[start..].starts_with(XML_PROLOG)
}

pub fn default_export_filename(batch: &SettlementBatch) -> String {
    let name = batch.name.chars().map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' }).collect::<String>();
    format!("iso20022_{name}.xml")
}

//--------------------------------------      Settlement     ---------------------------------------------------------
/// Runs the payment and export sequence for one order against an accounting backend.
pub struct Settlement<'a, B> {
    backend: &'a B,
    config: &'a SyncConfig,
}

impl<'a, B> Settlement<'a, B>
where B: AccountingBackend
{
    pub fn new(backend: &'a B, config: &'a SyncConfig) -> Self {
        Self { backend, config }
    }

    /// Runs the sequence, writing the payment link and the payment state into `snapshot` as they are established.
    /// Notes for the audit trail are appended to `notes`.
    ///
    /// On error, `snapshot.payment_state` is left for the caller to set from [`SettlementError::resulting_state`].
    pub async fn run(
        &self,
        order: &SalesOrder,
        snapshot: &mut OrderSnapshot,
        notes: &mut Vec<String>,
    ) -> Result<SettlementOutcome, SettlementError> {
        if LifecycleState::from_op_code(&snapshot.op_code).is_blocked() {
            return Err(SettlementError::Blocked(snapshot.op_code.clone()));
        }
        let Some(bill_id) = snapshot.vendor_bill_id else {
            return Ok(SettlementOutcome::Skipped(SkipReason::NoBill));
        };
        let bill = self.backend.fetch_bill(bill_id).await?.ok_or(SettlementError::BillNotFound(bill_id))?;
        let bill = match bill.state {
            BillState::Cancelled => {
                debug!("💸️ Vendor bill {bill_id} for {} is cancelled. Not paying it.", order.name);
                return Ok(SettlementOutcome::Skipped(SkipReason::BillCancelled));
            },
            BillState::Draft => self.post_bill(bill_id, notes).await?,
            BillState::Posted => bill,
        };
        let reference = snapshot.transfer_ref.trim().to_string();
        if reference.is_empty() {
            return Ok(SettlementOutcome::Skipped(SkipReason::NoTransferReference));
        }

        let journal = self.resolve_bank_journal().await?;
        let method_line = self.resolve_method_line(&journal).await?;
        let bank_account = self
            .backend
            .fetch_vendor_bank_account(bill.partner_id)
            .await?
            .ok_or(SettlementError::NoVendorBankAccount(bill.partner_id))?;

        let payment = match self.linked_payment(snapshot).await? {
            Some(payment) => self.align_reference(payment, &reference, notes).await?,
            None => {
                let payment = self
                    .backend
                    .create_payment(NewVendorPayment {
                        partner_id: bill.partner_id,
                        amount: bill.amount_residual.abs(),
                        currency: bill.currency.clone(),
                        journal_id: journal.id,
                        method_line_id: method_line.id,
                        bank_account_id: bank_account.id,
                        reference: reference.clone(),
                    })
                    .await?;
                info!("💸️ Vendor payment {} created for {} ({})", payment.id, order.name, payment.amount);
                notes.push(format!("Vendor payment {} created for {}", payment.id, payment.amount));
                payment
            },
        };
        snapshot.vendor_payment_id = Some(payment.id);

        let payment = if payment.posted {
            payment
        } else {
            let payment = self
                .backend
                .post_payment(payment.id)
                .await
                .map_err(|e| SettlementError::PaymentNotPosted(payment.id, e.to_string()))?;
            notes.push(format!("Vendor payment {} posted", payment.id));
            payment
        };
        snapshot.payment_state = PaymentState::Posted;

        if let Err(e) = self.backend.reconcile_payment(payment.id, bill.id).await {
            warn!("💸️ Could not reconcile payment {} with bill {}. {e}", payment.id, bill.id);
        }

        let batch = self.resolve_batch(&payment, &journal, &method_line, &reference).await?;
        let state = self.export(&batch, &payment, notes).await?;
        snapshot.payment_state = state;
        Ok(SettlementOutcome::Settled { payment_id: payment.id, batch_id: batch.id, state })
    }

    async fn post_bill(&self, bill_id: BillId, notes: &mut Vec<String>) -> Result<VendorBill, SettlementError> {
        let bill =
            self.backend.post_bill(bill_id).await.map_err(|e| SettlementError::BillNotPosted(bill_id, e.to_string()))?;
        match bill.state {
            BillState::Posted => {
                notes.push(format!("Vendor bill {bill_id} posted"));
                Ok(bill)
            },
            state => Err(SettlementError::BillNotPosted(bill_id, format!("The bill is still {state:?}"))),
        }
    }

    /// Configured journal, then the `BNK5` journal, then one named like "Banco", then any bank journal.
    pub async fn resolve_bank_journal(&self) -> Result<Journal, SettlementError> {
        if let Some(id) = self.config.bank_journal_id {
            match self.backend.fetch_journal(id).await? {
                Some(journal) if journal.kind == JournalKind::Bank => return Ok(journal),
                _ => warn!("💸️ Configured bank journal {id} is missing or is not a bank journal"),
            }
        }
        let bank = JournalQuery::new().with_kind(JournalKind::Bank);
        let queries = [
            bank.clone().with_code(DEFAULT_BANK_JOURNAL_CODE),
            bank.clone().with_name_like(BANK_JOURNAL_NAME_HINT),
            bank,
        ];
        for query in &queries {
            if let Some(journal) = self.backend.search_journal(query).await? {
                return Ok(journal);
            }
        }
        Err(SettlementError::NoBankJournal)
    }

    /// An existing ISO 20022 / SEPA method line on the journal, or a new one for a matching payment method.
    pub async fn resolve_method_line(&self, journal: &Journal) -> Result<PaymentMethodLine, SettlementError> {
        if let Some(line) = self.backend.search_method_line(journal.id, &METHOD_LINE_NAME_PATTERNS).await? {
            return Ok(line);
        }
        let method = self
            .backend
            .search_payment_method(&PAYMENT_METHOD_CODES)
            .await?
            .ok_or(SettlementError::NoPaymentMethod(journal.id))?;
        info!("💸️ Enabling payment method {} on journal {}", method.code, journal.code);
        Ok(self.backend.create_method_line(journal.id, &method).await?)
    }

    async fn linked_payment(&self, snapshot: &OrderSnapshot) -> Result<Option<VendorPayment>, SettlementError> {
        match snapshot.vendor_payment_id {
            Some(id) => {
                let payment = self.backend.fetch_payment(id).await?;
                if payment.is_none() {
                    warn!("💸️ Linked payment {id} has disappeared. A new one will be created.");
                }
                Ok(payment)
            },
            None => Ok(None),
        }
    }

    async fn align_reference(
        &self,
        mut payment: VendorPayment,
        reference: &str,
        notes: &mut Vec<String>,
    ) -> Result<VendorPayment, SettlementError> {
        if payment.memo != reference || payment.payment_reference != reference {
            self.backend.update_payment_reference(payment.id, reference).await?;
            notes.push(format!("Vendor payment {} reference updated to {reference}", payment.id));
            payment.memo = reference.to_string();
            payment.payment_reference = reference.to_string();
        }
        Ok(payment)
    }

    async fn resolve_batch(
        &self,
        payment: &VendorPayment,
        journal: &Journal,
        method_line: &PaymentMethodLine,
        reference: &str,
    ) -> Result<SettlementBatch, SettlementError> {
        let query = BatchQuery { journal_id: journal.id, outbound: true, method_id: method_line.method_id };
        if let Some(batch_id) = payment.batch_id {
            match self.backend.fetch_batch(batch_id).await? {
                Some(batch) if batch.is_compatible_with(&query) => return Ok(batch),
                _ => debug!("💸️ Payment {} sits in an incompatible batch {batch_id}", payment.id),
            }
        }
        let batch = match self.backend.search_open_batch(&query).await? {
            Some(batch) => batch,
            None => {
                let batch = NewSettlementBatch {
                    name: format!("Infortisa {reference}"),
                    journal_id: journal.id,
                    outbound: true,
                    method_id: method_line.method_id,
                    payment_ids: vec![],
                };
                self.backend.create_batch(batch).await?
            },
        };
        if !batch.payment_ids.contains(&payment.id) {
            self.backend.add_payment_to_batch(batch.id, payment.id).await?;
        }
        Ok(batch)
    }

    async fn export(
        &self,
        batch: &SettlementBatch,
        payment: &VendorPayment,
        notes: &mut Vec<String>,
    ) -> Result<PaymentState, SettlementError> {
        let generated = self
            .backend
            .generate_export_file(batch.id)
            .await
            .map_err(|e| SettlementError::ExportFailed(batch.id, e.to_string()))?;
        let mut found = None;
        for source in EXPORT_SOURCES {
            let candidates = match source {
                ExportSource::GenerationResult => generated.clone().into_iter().collect(),
                _ => self.probe(source, batch.id, payment.id).await,
            };
            if let Some(file) = candidates.iter().find_map(decode_export_candidate) {
                trace!("💸️ Settlement file for batch {} found via {source:?}", batch.id);
                found = Some(file);
                break;
            }
        }
        let Some(file) = found else {
            notes.push(format!("Settlement file for batch {} is not available yet. Will retry.", batch.name));
            return Ok(PaymentState::ToExport);
        };
        let name = file.filename.unwrap_or_else(|| default_export_filename(batch));
        let owner = AttachmentOwner::Batch(batch.id);
        if self.backend.find_attachment(owner, &name).await?.is_none() {
            let attachment = NewAttachment { name: name.clone(), mimetype: XML_MIMETYPE.to_string(), data: file.xml };
            self.backend.create_attachment(owner, attachment).await?;
            notes.push(format!("Settlement file {name} attached to batch {}", batch.name));
        }
        Ok(PaymentState::Exported)
    }

    /// Probe failures are not fatal. They just mean that source has nothing to offer.
    async fn probe(&self, source: ExportSource, batch_id: BatchId, payment_id: PaymentId) -> Vec<ExportPayload> {
        let result = match source {
            ExportSource::GenerationResult => Ok(vec![]),
            ExportSource::BatchFields => self.backend.batch_export_fields(batch_id).await,
            ExportSource::BatchAttachments => self.attachments(AttachmentOwner::Batch(batch_id)).await,
            ExportSource::PaymentAttachments => self.attachments(AttachmentOwner::Payment(payment_id)).await,
            ExportSource::Regeneration => {
                self.backend.regenerate_export_file(batch_id).await.map(|p| p.into_iter().collect())
            },
        };
        result.unwrap_or_else(|e| {
            warn!("💸️ Could not probe {source:?} for batch {batch_id}. {e}");
            vec![]
        })
    }

    async fn attachments(&self, owner: AttachmentOwner) -> Result<Vec<ExportPayload>, AccountingError> {
        let attachments = self.backend.list_xml_attachments(owner).await?;
        Ok(attachments.into_iter().map(|a| ExportPayload::bytes(a.data).with_filename(a.name)).collect())
    }
}

#[cfg(test)]
mod test {
    use fsg_common::Money;

    use super::*;
    use crate::test_utils::{ExportBehaviour, MemoryBackend};

    const XML: &str = "<?xml version=\"1.0\"?><Document/>";

    #[tokio::test]
    async fn repeated_export_attaches_one_file() {
        let vendor = PartnerId(500);
        let backend = MemoryBackend::new().with_standard_accounting(vendor);
        backend.set_export(ExportBehaviour { generated: Some(ExportPayload::text(XML)), ..Default::default() });
        backend.state().bills.insert(BillId(900), VendorBill {
            id: BillId(900),
            partner_id: vendor,
            journal_id: JournalId(1),
            state: BillState::Posted,
            amount_residual: "-24.50".parse::<Money>().unwrap(),
            currency: "EUR".into(),
            origin: "S00001".into(),
            payment_reference: "TR-5".into(),
            reference: "TR-5".into(),
        });
        let order = SalesOrder { name: "S00001".into(), ..Default::default() };
        let mut snapshot = OrderSnapshot {
            op_code: "VR/1".into(),
            transfer_ref: "TR-5".into(),
            vendor_bill_id: Some(BillId(900)),
            ..Default::default()
        };
        let config = SyncConfig::default();
        let settlement = Settlement::new(&backend, &config);
        let mut notes = Vec::new();

        let outcome = settlement.run(&order, &mut snapshot, &mut notes).await.unwrap();
        assert!(matches!(outcome, SettlementOutcome::Settled { state: PaymentState::Exported, .. }));
        snapshot.payment_state = PaymentState::ToExport;
        let outcome = settlement.run(&order, &mut snapshot, &mut notes).await.unwrap();
        assert!(matches!(outcome, SettlementOutcome::Settled { state: PaymentState::Exported, .. }));

        let state = backend.state();
        assert_eq!(state.payments.len(), 1);
        assert_eq!(state.payments.values().next().unwrap().amount, "24.50".parse::<Money>().unwrap());
        assert_eq!(state.batches.len(), 1);
        assert_eq!(state.attachments.len(), 1);
        assert_eq!(snapshot.payment_state, PaymentState::Exported);
    }

    #[tokio::test]
    async fn blocked_orders_are_refused() {
        let backend = MemoryBackend::new();
        let config = SyncConfig::default();
        let mut snapshot = OrderSnapshot { op_code: "HR/7".into(), ..Default::default() };
        let err = Settlement::new(&backend, &config)
            .run(&SalesOrder::default(), &mut snapshot, &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Blocked(_)));
        assert_eq!(err.resulting_state(), PaymentState::Missing);
    }

    #[test]
    fn base64_candidates_are_decoded() {
        let payload = ExportPayload::bytes(base64::encode(XML).into_bytes()).with_filename("pain.xml");
        let file = decode_export_candidate(&payload).unwrap();
        assert_eq!(file.xml, XML.as_bytes());
        assert_eq!(file.filename.as_deref(), Some("pain.xml"));
    }

    #[test]
    fn raw_candidates_are_accepted() {
        let file = decode_export_candidate(&ExportPayload::text(format!("\n  {XML}"))).unwrap();
        assert!(file.xml.ends_with(b"<Document/>"));
        assert!(file.filename.is_none());
    }

    #[test]
    fn non_xml_candidates_are_rejected() {
        assert!(decode_export_candidate(&ExportPayload::text("")).is_none());
        assert!(decode_export_candidate(&ExportPayload::text("PDF-1.4")).is_none());
        assert!(decode_export_candidate(&ExportPayload::bytes(base64::encode("hello").into_bytes())).is_none());
    }

    #[test]
    fn blocked_errors_reset_to_missing() {
        assert_eq!(SettlementError::Blocked("VX/1".into()).resulting_state(), PaymentState::Missing);
        assert_eq!(SettlementError::NoBankJournal.resulting_state(), PaymentState::Failed);
    }

    #[test]
    fn default_filename_is_safe() {
        let batch = SettlementBatch {
            id: BatchId(3),
            name: "Infortisa TR/77".into(),
            journal_id: JournalId(1),
            outbound: true,
            method_id: Default::default(),
            payment_ids: vec![],
        };
        assert_eq!(default_export_filename(&batch), "iso20022_Infortisa_TR_77.xml");
    }
}
