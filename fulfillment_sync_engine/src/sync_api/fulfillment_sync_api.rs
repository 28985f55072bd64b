use std::fmt::Debug;

use chrono::Utc;
use infortisa_tools::{
    encode_utf16,
    parse_acknowledgment,
    parse_status_response,
    BlockRequest,
    OrderRequest,
    SPECIAL_DESTINATION_SHOP,
};
use log::*;

use crate::{
    billing,
    config::SyncConfig,
    lifecycle::LifecycleState,
    reconcile::reconcile,
    settlement::{Settlement, SettlementOutcome},
    sync_api::{PollOrigin, PollResult, PollSummary, RawExchange, SendOptions, SendResult, SyncError},
    sync_types::{BillId, OrderId, OrderSnapshot, PaymentState, SalesOrder, TrackingState},
    tracking::{compose_tracking_message, plan_tracking},
    traits::{FulfillmentProvider, NotificationError, SyncBackend},
};

/// How much of a provider response is copied into audit notes.
const RESPONSE_PREVIEW_CHARS: usize = 500;
const CREATE_ACCEPTED: [u16; 2] = [200, 201];
const QUERY_ACCEPTED: [u16; 1] = [200];

/// `FulfillmentSyncApi` keeps the host's orders in step with Infortisa.
///
/// Every operation works on one order, loads it from the host, talks to Infortisa at most once or twice, and writes
/// back a single updated snapshot together with audit notes.
pub struct FulfillmentSyncApi<P, B> {
    provider: P,
    backend: B,
    config: SyncConfig,
}

impl<P, B> Debug for FulfillmentSyncApi<P, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FulfillmentSyncApi")
    }
}

impl<P, B> FulfillmentSyncApi<P, B> {
    pub fn new(provider: P, backend: B, config: SyncConfig) -> Self {
        Self { provider, backend, config }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}

impl<P, B> FulfillmentSyncApi<P, B>
where
    P: FulfillmentProvider,
    B: SyncBackend,
{
    async fn load(&self, order_id: OrderId) -> Result<SalesOrder, SyncError> {
        self.backend.fetch_order(order_id).await?.ok_or(SyncError::OrderNotFound(order_id))
    }

    async fn save(&self, order_id: OrderId, snapshot: &OrderSnapshot) -> Result<(), SyncError> {
        self.backend.save_snapshot(order_id, snapshot).await?;
        Ok(())
    }

    async fn note(&self, order_id: OrderId, note: &str) -> Result<(), SyncError> {
        self.backend.post_note(order_id, note).await?;
        Ok(())
    }

    //--------------------------------------    Eligibility    -------------------------------------------------------
    /// Recomputes whether the order may be synchronised with Infortisa and stores the result if it changed.
    pub async fn refresh_allowed(&self, order_id: OrderId) -> Result<bool, SyncError> {
        let mut order = self.load(order_id).await?;
        let allowed = order.is_supplied_by(self.config.vendor_id);
        if allowed != order.sync.allowed {
            debug!("📦️ Order {} eligibility for Infortisa changed to {allowed}", order.name);
            order.sync.allowed = allowed;
            self.save(order_id, &order.sync).await?;
        }
        Ok(allowed)
    }

    //--------------------------------------       Send        -------------------------------------------------------
    /// Submits the order to Infortisa.
    ///
    /// The order must contain a product supplied by Infortisa and must not have been sent already. The request and the
    /// response are stored on the order even when the submission fails.
    pub async fn send_order(&self, order_id: OrderId, options: SendOptions) -> Result<SendResult, SyncError> {
        let mut order = self.load(order_id).await?;
        let allowed = order.is_supplied_by(self.config.vendor_id);
        if allowed != order.sync.allowed {
            order.sync.allowed = allowed;
            self.save(order_id, &order.sync).await?;
        }
        if !allowed {
            return Err(SyncError::Validation(format!("Order {} has no products supplied by Infortisa", order.name)));
        }
        if order.sync.sent {
            return Err(SyncError::AlreadySent(order.name));
        }
        let mut snapshot = order.sync.clone();
        if snapshot.customer_reference.trim().is_empty() {
            snapshot.customer_reference = order.default_customer_reference();
        }
        let shipping = self.backend.resolve_shipping(&order).await;
        let test = self.config.test_mode;
        let blocked = options.block.unwrap_or(self.config.default_block);
        let request = OrderRequest::new(&snapshot.customer_reference, shipping.address)
            .with_test(test)
            .with_block(blocked)
            .with_comment(&order.note)
            .with_special_destination(shipping.special_destination)
            .with_lines(&order.request_lines())?;
        let xml = request.to_xml()?;
        snapshot.last_payload = xml.clone();
        debug!("📦️ Sending order {} to Infortisa as {}", order.name, snapshot.customer_reference);
        let response = match self.provider.submit_order(encode_utf16(&xml)).await {
            Ok(r) => r,
            Err(e) => {
                self.save(order_id, &snapshot).await?;
                return Err(e.into());
            },
        };
        snapshot.last_response = response.body.clone();
        self.save(order_id, &snapshot).await?;
        response.ensure_status(&CREATE_ACCEPTED)?;
        let ack = parse_acknowledgment(&response.body)?;

        snapshot.sent = true;
        if snapshot.internal_reference.is_empty() {
            snapshot.internal_reference = ack.internal_reference.unwrap_or_default();
        }
        snapshot.status_text = if test { "Test OK".to_string() } else { "Importing".to_string() };
        self.save(order_id, &snapshot).await?;

        let mut note = String::from("Order sent to Infortisa");
        if test {
            note.push_str(" (test mode)");
        }
        if blocked {
            note.push_str(" (blocked)");
        }
        if shipping.special_destination {
            note.push_str(&format!(". Shipping to special destination {SPECIAL_DESTINATION_SHOP}"));
        }
        note.push_str(&format!(".\nResponse: {}", response.body_preview(RESPONSE_PREVIEW_CHARS)));
        self.note(order_id, &note).await?;
        info!("📦️ Order {} sent to Infortisa. Internal reference: {}", order.name, snapshot.internal_reference);
        Ok(SendResult {
            customer_reference: snapshot.customer_reference,
            internal_reference: snapshot.internal_reference,
            test,
            blocked,
        })
    }

    /// Hook for order confirmation. Eligible orders that have not been sent yet are sent automatically.
    ///
    /// A failure to send never fails the confirmation: it is logged and noted on the order instead.
    pub async fn on_order_confirmed(&self, order_id: OrderId) -> Result<Option<SendResult>, SyncError> {
        let order = self.load(order_id).await?;
        if order.sync.sent || !order.is_supplied_by(self.config.vendor_id) {
            trace!("📦️ Order {} is not due for automatic sending", order.name);
            return Ok(None);
        }
        match self.send_order(order_id, SendOptions::default()).await {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                warn!("📦️ Automatic send of order {} to Infortisa failed. {e}", order.name);
                self.note(order_id, &format!("Automatic send to Infortisa failed: {e}")).await?;
                Ok(None)
            },
        }
    }

    //--------------------------------------      Polling      -------------------------------------------------------
    /// Fetches the Infortisa status of the order and applies it: reconciles the snapshot, handles tracking, and drives
    /// the billing and payment flow.
    pub async fn poll_status(&self, order_id: OrderId, origin: PollOrigin) -> Result<PollResult, SyncError> {
        let order = self.load(order_id).await?;
        let mut snapshot = order.sync.clone();
        if snapshot.customer_reference.trim().is_empty() {
            return Err(SyncError::Validation(format!("{} has no Infortisa customer reference", order.name)));
        }
        trace!("🔄️ {origin} poll of {} ({})", order.name, snapshot.customer_reference);
        let response = self.provider.order_status(&snapshot.customer_reference).await?;
        snapshot.last_response = response.body.clone();
        if let Err(e) = response.ensure_status(&QUERY_ACCEPTED) {
            self.save(order_id, &snapshot).await?;
            return Err(e.into());
        }
        let report = parse_status_response(&response.body);
        let reconciliation = reconcile(&snapshot, &report);
        let mut snapshot = reconciliation.snapshot;
        let mut notes = reconciliation.changes;

        if reconciliation.transfer_ref_changed {
            if let Some(bill_id) = snapshot.vendor_bill_id {
                self.stamp_bill_reference(bill_id, &snapshot.transfer_ref, &mut notes).await;
            }
        }

        let mut notified = false;
        if let Some(op) = &report.operation {
            let plan = plan_tracking(&snapshot.tracking, &op.tracking);
            snapshot.tracking = plan.tracking;
            if plan.notify {
                match self.deliver_tracking(&order, &snapshot.tracking, &op.tracking.status_datetime).await {
                    Ok(()) => {
                        snapshot.tracking.notified = true;
                        notified = true;
                        notes.push(format!("Tracking details sent to the customer: {}", snapshot.tracking.url));
                    },
                    Err(e) => {
                        warn!("🚚️ Could not send tracking details for {}. {e}", order.name);
                        notes.push(format!("Could not send tracking details to the customer: {e}. Will retry."));
                    },
                }
            } else if let Some(change) = plan.change_note {
                notes.push(change);
            }
        }

        let lifecycle = LifecycleState::from_op_code(&snapshot.op_code);
        self.apply_lifecycle(&order, lifecycle, origin, &mut snapshot, &mut notes).await;

        snapshot.last_polled_at = Some(Utc::now());
        self.save(order_id, &snapshot).await?;
        match origin {
            PollOrigin::Scheduled if !notes.is_empty() => self.note(order_id, &notes.join("\n")).await?,
            PollOrigin::Scheduled => {},
            PollOrigin::Manual => {
                let mut note = format!("Infortisa status updated: {}", snapshot.status_text);
                for change in &notes {
                    note.push('\n');
                    note.push_str(change);
                }
                note.push_str(&format!("\nResponse: {}", response.body_preview(RESPONSE_PREVIEW_CHARS)));
                self.note(order_id, &note).await?;
            },
        }
        debug!("🔄️ Order {} is {} ({lifecycle}). {} changes", order.name, snapshot.status_text, notes.len());
        Ok(PollResult {
            order_id,
            status: snapshot.status_text,
            lifecycle,
            payment_state: snapshot.payment_state,
            changes: notes,
            notified,
        })
    }

    /// Polls every sent and eligible order. A failure on one order is logged and noted on that order, and never stops
    /// the others from being polled.
    pub async fn poll_all(&self) -> Result<PollSummary, SyncError> {
        let orders = self.backend.fetch_pollable_orders().await?;
        let mut summary = PollSummary::default();
        for order in orders.into_iter().filter(|o| o.sync.sent && o.sync.allowed) {
            match self.poll_status(order.id, PollOrigin::Scheduled).await {
                Ok(result) => summary.polled.push(result),
                Err(e) => {
                    error!("🔄️ Polling Infortisa for order {} failed. {e}", order.name);
                    if let Err(note_err) = self.note(order.id, &format!("Infortisa status poll failed: {e}")).await {
                        error!("🔄️ Could not record the poll failure on order {}. {note_err}", order.name);
                    }
                    summary.failures.push((order.id, e));
                },
            }
        }
        info!("🔄️ Polled {} Infortisa orders. {} failed.", summary.total(), summary.failures.len());
        Ok(summary)
    }

    async fn apply_lifecycle(
        &self,
        order: &SalesOrder,
        lifecycle: LifecycleState,
        origin: PollOrigin,
        snapshot: &mut OrderSnapshot,
        notes: &mut Vec<String>,
    ) {
        match lifecycle {
            LifecycleState::Blocked => {
                if snapshot.payment_state != PaymentState::Missing || origin == PollOrigin::Manual {
                    notes.push(format!("Infortisa code {} blocks payment. No financial follow-up.", snapshot.op_code));
                }
                snapshot.payment_state = PaymentState::Missing;
            },
            LifecycleState::Payable if !snapshot.transfer_ref.is_empty() => {
                if snapshot.vendor_bill_id.is_none() && self.config.auto_create_bill {
                    let current = SalesOrder { sync: snapshot.clone(), ..order.clone() };
                    match billing::create_vendor_bill(&self.backend, &self.config, &current).await {
                        Ok(bill) => {
                            snapshot.vendor_bill_id = Some(bill.id);
                            let reference = &snapshot.transfer_ref;
                            notes.push(format!("Vendor bill {} created with reference {reference}", bill.id));
                        },
                        Err(e) => {
                            warn!("🧾️ Could not create the Infortisa bill for {}. {e}", order.name);
                            notes.push(format!("Could not create the vendor bill: {e}"));
                        },
                    }
                }
                if snapshot.vendor_bill_id.is_some() && needs_settlement(snapshot) {
                    self.settle(order, snapshot, notes).await;
                }
            },
            LifecycleState::Payable | LifecycleState::Pending => {
                if origin == PollOrigin::Manual && snapshot.op_code.is_empty() {
                    notes.push("Infortisa has not assigned a code yet. Financial follow-up deferred.".to_string());
                }
            },
        }
    }

    async fn settle(&self, order: &SalesOrder, snapshot: &mut OrderSnapshot, notes: &mut Vec<String>) {
        let settlement = Settlement::new(&self.backend, &self.config);
        match settlement.run(order, snapshot, notes).await {
            Ok(SettlementOutcome::Skipped(reason)) => {
                debug!("💸️ Payment for {} skipped: {reason:?}", order.name);
            },
            Ok(SettlementOutcome::Settled { payment_id, batch_id, state }) => {
                info!("💸️ Payment {payment_id} for {} is in batch {batch_id}. State: {state}", order.name);
            },
            Err(e) => {
                error!("💸️ Paying Infortisa for {} failed. {e}", order.name);
                snapshot.payment_state = e.resulting_state();
                notes.push(format!("Vendor payment: {e}"));
            },
        }
    }

    async fn stamp_bill_reference(&self, bill_id: BillId, reference: &str, notes: &mut Vec<String>) {
        match self.backend.set_bill_reference(bill_id, reference).await {
            Ok(()) => notes.push(format!("Vendor bill {bill_id} reference set to {reference}")),
            Err(e) => {
                warn!("🧾️ Could not update the reference of bill {bill_id}. {e}");
                notes.push(format!("Could not update the reference of vendor bill {bill_id}: {e}"));
            },
        }
    }

    //--------------------------------------  Block / cancel   -------------------------------------------------------
    pub async fn block_order(&self, order_id: OrderId) -> Result<PollResult, SyncError> {
        self.send_block_request(order_id, BlockRequest::block, "Block").await
    }

    pub async fn unblock_order(&self, order_id: OrderId) -> Result<PollResult, SyncError> {
        self.send_block_request(order_id, BlockRequest::unblock, "Unblock").await
    }

    pub async fn cancel_order(&self, order_id: OrderId) -> Result<PollResult, SyncError> {
        self.send_block_request(order_id, BlockRequest::cancel, "Cancellation").await
    }

    async fn send_block_request(
        &self,
        order_id: OrderId,
        build: fn(&str) -> BlockRequest,
        action: &str,
    ) -> Result<PollResult, SyncError> {
        let order = self.load(order_id).await?;
        if !order.sync.sent {
            return Err(SyncError::Validation(format!("Order {} has not been sent to Infortisa", order.name)));
        }
        let mut snapshot = order.sync.clone();
        let xml = build(&snapshot.customer_reference).to_xml()?;
        snapshot.last_payload = xml.clone();
        let response = match self.provider.block_order(encode_utf16(&xml)).await {
            Ok(r) => r,
            Err(e) => {
                self.save(order_id, &snapshot).await?;
                return Err(e.into());
            },
        };
        snapshot.last_response = response.body.clone();
        self.save(order_id, &snapshot).await?;
        response.ensure_status(&QUERY_ACCEPTED)?;
        info!("📦️ {action} request for {} accepted by Infortisa", order.name);
        let preview = response.body_preview(RESPONSE_PREVIEW_CHARS);
        self.note(order_id, &format!("{action} request sent to Infortisa.\nResponse: {preview}")).await?;
        self.poll_status(order_id, PollOrigin::Manual).await
    }

    //--------------------------------------      Billing      -------------------------------------------------------
    /// Creates the Infortisa vendor bill for the order and links it. Fails if one is already linked.
    pub async fn create_vendor_bill(&self, order_id: OrderId) -> Result<BillId, SyncError> {
        let mut order = self.load(order_id).await?;
        let bill = billing::create_vendor_bill(&self.backend, &self.config, &order).await?;
        order.sync.vendor_bill_id = Some(bill.id);
        self.save(order_id, &order.sync).await?;
        self.note(order_id, &format!("Vendor bill {} created for {}", bill.id, bill.origin)).await?;
        Ok(bill.id)
    }

    //--------------------------------------      Tracking     -------------------------------------------------------
    async fn deliver_tracking(
        &self,
        order: &SalesOrder,
        tracking: &TrackingState,
        status_datetime: &str,
    ) -> Result<(), NotificationError> {
        let message = compose_tracking_message(order, tracking, status_datetime)?;
        self.backend.deliver(&message).await
    }

    /// Sends the tracking details to the customer, unless that has already happened.
    pub async fn notify_tracking(&self, order_id: OrderId) -> Result<(), SyncError> {
        let mut order = self.load(order_id).await?;
        if order.sync.tracking.url.is_empty() {
            return Err(SyncError::NoTracking);
        }
        if order.sync.tracking.notified {
            return Err(SyncError::AlreadyNotified);
        }
        self.deliver_tracking(&order, &order.sync.tracking, "").await?;
        order.sync.tracking.notified = true;
        self.save(order_id, &order.sync).await?;
        self.note(order_id, &format!("Tracking details sent to the customer: {}", order.sync.tracking.url)).await
    }

    /// Sends the tracking details again. The notified flag is left as it is.
    pub async fn resend_tracking(&self, order_id: OrderId) -> Result<(), SyncError> {
        let order = self.load(order_id).await?;
        if order.sync.tracking.url.is_empty() {
            return Err(SyncError::NoTracking);
        }
        self.deliver_tracking(&order, &order.sync.tracking, "").await?;
        self.note(order_id, &format!("Tracking details sent again to the customer: {}", order.sync.tracking.url))
            .await
    }

    //--------------------------------------    Diagnostics    -------------------------------------------------------
    pub async fn raw_exchange(&self, order_id: OrderId) -> Result<RawExchange, SyncError> {
        let order = self.load(order_id).await?;
        Ok(RawExchange { payload: order.sync.last_payload, response: order.sync.last_response })
    }
}

/// Payment and export are (re)tried until the settlement file is attached. A failed settlement waits for an operator.
fn needs_settlement(snapshot: &OrderSnapshot) -> bool {
    snapshot.vendor_payment_id.is_none() ||
        matches!(snapshot.payment_state, PaymentState::Missing | PaymentState::Posted | PaymentState::ToExport)
}
