use fsg_common::Money;
use fulfillment_sync_engine::{
    sync_types::{OrderId, PaymentState},
    test_utils::{status_xml, ExportBehaviour, MemoryBackend, OperationXml},
    traits::data_objects::{BillState, ExportPayload, JournalKind},
    FulfillmentSyncApi,
    LifecycleState,
    PollOrigin,
    SyncConfig,
    SyncError,
};

mod support;
use support::*;

const SETTLEMENT_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Document><CstmrCdtTrfInitn/></Document>";

fn m(s: &str) -> Money {
    s.parse().unwrap()
}

fn shipped() -> OperationXml {
    OperationXml {
        code: "PR/2024/7",
        status: "Shipped",
        payment_reference: "TR-9",
        shipping: "4.00",
        total: "25.00",
        canon: "1.00",
        products: vec![("INF-001", "2", "10.00", "0.50")],
        ..Default::default()
    }
}

fn payable() -> OperationXml {
    OperationXml { code: "VR/2024/7", status: "Invoiced", ..shipped() }
}

fn provider_returning(times: usize, body: String) -> MockProvider {
    let mut provider = MockProvider::new();
    provider.expect_order_status().times(times).returning(move |_| http(200, body.clone()));
    provider
}

fn xml_export() -> ExportBehaviour {
    ExportBehaviour { generated: Some(ExportPayload::text(SETTLEMENT_XML)), ..Default::default() }
}

#[tokio::test]
async fn amounts_are_overwritten_on_every_poll() {
    let mut provider = MockProvider::new();
    let mut seq = mockall::Sequence::new();
    let first = status_xml(&shipped());
    let second = status_xml(&OperationXml { shipping: "6.00", total: "27.00", ..shipped() });
    provider.expect_order_status().times(1).in_sequence(&mut seq).returning(move |_| http(200, first.clone()));
    provider.expect_order_status().times(1).in_sequence(&mut seq).returning(move |_| http(200, second.clone()));
    let backend = MemoryBackend::new();
    backend.insert_order(sent_order(1));
    let api = setup(provider, backend.clone());

    let result = api.poll_status(OrderId(1), PollOrigin::Scheduled).await.unwrap();
    assert_eq!(result.status, "Shipped");
    assert_eq!(result.lifecycle, LifecycleState::Pending);
    let snapshot = backend.snapshot(OrderId(1));
    assert_eq!(snapshot.amounts.base, m("20"));
    assert_eq!(snapshot.amounts.canon_op, m("1"));
    assert_eq!(snapshot.amounts.shipping, m("4"));
    assert_eq!(snapshot.op_code, "PR/2024/7");
    assert_eq!(snapshot.transfer_ref, "TR-9");
    assert!(snapshot.products_summary.contains("INF-001"));
    assert!(snapshot.last_polled_at.is_some());

    let result = api.poll_status(OrderId(1), PollOrigin::Scheduled).await.unwrap();
    assert_eq!(result.changes, vec!["Shipping: 4.00 -> 6.00".to_string(), "Total: 25.00 -> 27.00".to_string()]);
    let snapshot = backend.snapshot(OrderId(1));
    assert_eq!(snapshot.amounts.shipping, m("6"));
    assert_eq!(snapshot.amounts.total, m("27"));
    let notes = backend.notes_for(OrderId(1));
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[1], "Shipping: 4.00 -> 6.00\nTotal: 25.00 -> 27.00");
}

#[tokio::test]
async fn quiet_scheduled_polls_leave_no_notes() {
    let provider = provider_returning(2, status_xml(&shipped()));
    let backend = MemoryBackend::new();
    backend.insert_order(sent_order(2));
    let api = setup(provider, backend.clone());
    api.poll_status(OrderId(2), PollOrigin::Scheduled).await.unwrap();
    let result = api.poll_status(OrderId(2), PollOrigin::Scheduled).await.unwrap();
    assert!(result.changes.is_empty());
    assert_eq!(backend.notes_for(OrderId(2)).len(), 1);
}

#[tokio::test]
async fn tracking_is_notified_exactly_once() {
    let op = OperationXml { tracking_url: "https://track.example/ABC", tracking_number: "ABC", ..shipped() };
    let provider = provider_returning(3, status_xml(&op));
    let backend = MemoryBackend::new();
    backend.insert_order(sent_order(3));
    let api = setup(provider, backend.clone());

    let result = api.poll_status(OrderId(3), PollOrigin::Scheduled).await.unwrap();
    assert!(result.notified);
    let messages = backend.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].subject, "Tracking for your order S00003");
    assert!(messages[0].body.contains("https://track.example/ABC"));
    assert!(backend.snapshot(OrderId(3)).tracking.notified);

    let result = api.poll_status(OrderId(3), PollOrigin::Scheduled).await.unwrap();
    assert!(!result.notified);
    let result = api.poll_status(OrderId(3), PollOrigin::Manual).await.unwrap();
    assert!(!result.notified);
    assert_eq!(backend.messages().len(), 1);
}

#[tokio::test]
async fn failed_notification_is_retried() {
    let op = OperationXml { tracking_url: "https://track.example/XYZ", ..shipped() };
    let provider = provider_returning(2, status_xml(&op));
    let backend = MemoryBackend::new();
    backend.insert_order(sent_order(4));
    backend.state().fail_notifications = true;
    let api = setup(provider, backend.clone());

    let result = api.poll_status(OrderId(4), PollOrigin::Scheduled).await.unwrap();
    assert!(!result.notified);
    let snapshot = backend.snapshot(OrderId(4));
    assert_eq!(snapshot.tracking.url, "https://track.example/XYZ");
    assert!(!snapshot.tracking.notified);
    assert!(backend.notes_for(OrderId(4))[0].contains("Will retry"));

    backend.state().fail_notifications = false;
    let result = api.poll_status(OrderId(4), PollOrigin::Scheduled).await.unwrap();
    assert!(result.notified);
    assert!(backend.snapshot(OrderId(4)).tracking.notified);
    assert_eq!(backend.messages().len(), 1);
}

#[tokio::test]
async fn blocked_code_forces_missing_payment() {
    let op = OperationXml { code: "VX/2024/1", ..shipped() };
    let provider = provider_returning(2, status_xml(&op));
    let backend = MemoryBackend::new().with_standard_accounting(VENDOR);
    let mut order = sent_order(5);
    order.sync.payment_state = PaymentState::Posted;
    backend.insert_order(order);
    let api = setup(provider, backend.clone());

    let result = api.poll_status(OrderId(5), PollOrigin::Scheduled).await.unwrap();
    assert_eq!(result.lifecycle, LifecycleState::Blocked);
    assert_eq!(result.payment_state, PaymentState::Missing);
    assert!(result.changes.iter().any(|c| c.contains("blocks payment")));
    assert!(backend.state().bills.is_empty());
    assert!(backend.state().payments.is_empty());

    // Already missing, so a scheduled poll has nothing new to say
    let result = api.poll_status(OrderId(5), PollOrigin::Scheduled).await.unwrap();
    assert!(result.changes.is_empty());
    assert_eq!(backend.notes_for(OrderId(5)).len(), 1);
}

#[tokio::test]
async fn payable_order_is_billed_paid_and_exported_once() {
    let provider = provider_returning(3, status_xml(&payable()));
    let backend = MemoryBackend::new().with_standard_accounting(VENDOR);
    backend.set_export(xml_export());
    backend.insert_order(sent_order(6));
    let api = setup(provider, backend.clone());

    let result = api.poll_status(OrderId(6), PollOrigin::Scheduled).await.unwrap();
    assert_eq!(result.lifecycle, LifecycleState::Payable);
    assert_eq!(result.payment_state, PaymentState::Exported);
    let snapshot = backend.snapshot(OrderId(6));
    let bill_id = snapshot.vendor_bill_id.unwrap();
    let payment_id = snapshot.vendor_payment_id.unwrap();
    {
        let state = backend.state();
        let bill = &state.bills[&bill_id];
        assert_eq!(bill.state, BillState::Posted);
        assert_eq!(bill.partner_id, VENDOR);
        assert_eq!(bill.payment_reference, "TR-9");
        assert_eq!(bill.amount_residual, m("24"));
        let payment = &state.payments[&payment_id];
        assert!(payment.posted);
        assert_eq!(payment.amount, m("24"));
        assert_eq!(payment.memo, "TR-9");
        assert!(payment.batch_id.is_some());
        assert_eq!(state.reconciled, vec![(payment_id, bill_id)]);
        assert_eq!(state.attachments.len(), 1);
        assert_eq!(state.attachments[0].name, "iso20022_Infortisa_TR-9.xml");
        assert_eq!(state.attachments[0].data, SETTLEMENT_XML.as_bytes());
    }

    api.poll_status(OrderId(6), PollOrigin::Scheduled).await.unwrap();
    api.poll_status(OrderId(6), PollOrigin::Manual).await.unwrap();
    let state = backend.state();
    assert_eq!(state.bills.len(), 1);
    assert_eq!(state.payments.len(), 1);
    assert_eq!(state.batches.len(), 1);
    assert_eq!(state.attachments.len(), 1);
}

#[tokio::test]
async fn missing_settlement_file_is_retried() {
    let provider = provider_returning(2, status_xml(&payable()));
    let backend = MemoryBackend::new().with_standard_accounting(VENDOR);
    backend.insert_order(sent_order(7));
    let api = setup(provider, backend.clone());

    let result = api.poll_status(OrderId(7), PollOrigin::Scheduled).await.unwrap();
    assert_eq!(result.payment_state, PaymentState::ToExport);
    assert!(result.changes.iter().any(|c| c.contains("not available yet")));
    assert!(backend.state().attachments.is_empty());

    let field = ExportPayload::bytes(base64::encode(SETTLEMENT_XML).into_bytes()).with_filename("pain.001.xml");
    backend.set_export(ExportBehaviour { batch_fields: vec![field], ..Default::default() });
    let result = api.poll_status(OrderId(7), PollOrigin::Scheduled).await.unwrap();
    assert_eq!(result.payment_state, PaymentState::Exported);
    let state = backend.state();
    assert_eq!(state.payments.len(), 1);
    assert_eq!(state.attachments.len(), 1);
    assert_eq!(state.attachments[0].name, "pain.001.xml");
    assert_eq!(state.attachments[0].data, SETTLEMENT_XML.as_bytes());
}

#[tokio::test]
async fn export_generation_failure_marks_payment_failed() {
    let provider = provider_returning(1, status_xml(&payable()));
    let backend = MemoryBackend::new().with_standard_accounting(VENDOR);
    backend.set_export(ExportBehaviour { fail_generation: true, ..xml_export() });
    backend.insert_order(sent_order(8));
    let api = setup(provider, backend.clone());

    let result = api.poll_status(OrderId(8), PollOrigin::Scheduled).await.unwrap();
    assert_eq!(result.payment_state, PaymentState::Failed);
    assert!(result.changes.iter().any(|c| c.starts_with("Vendor payment: Settlement file generation failed")));
    let snapshot = backend.snapshot(OrderId(8));
    assert_eq!(snapshot.payment_state, PaymentState::Failed);
    assert!(snapshot.vendor_payment_id.is_some());
    assert!(backend.state().attachments.is_empty());
}

#[tokio::test]
async fn missing_bank_journal_marks_payment_failed() {
    let provider = provider_returning(1, status_xml(&payable()));
    let backend = MemoryBackend::new();
    backend.add_journal("Purchases", "BILL", JournalKind::Purchase);
    backend.add_bank_account(VENDOR, "ES00 0000");
    backend.insert_order(sent_order(9));
    let api = setup(provider, backend.clone());

    let result = api.poll_status(OrderId(9), PollOrigin::Scheduled).await.unwrap();
    assert_eq!(result.payment_state, PaymentState::Failed);
    let snapshot = backend.snapshot(OrderId(9));
    assert!(snapshot.vendor_bill_id.is_some());
    assert!(snapshot.vendor_payment_id.is_none());
    assert!(result.changes.iter().any(|c| c.contains("No bank journal")));
}

#[tokio::test]
async fn method_line_is_created_when_missing() {
    let provider = provider_returning(1, status_xml(&payable()));
    let backend = MemoryBackend::new();
    backend.add_journal("Purchases", "BILL", JournalKind::Purchase);
    backend.add_journal("Banco Secundario", "BNK2", JournalKind::Bank);
    backend.add_payment_method("ISO 20022", "iso20022");
    backend.add_bank_account(VENDOR, "ES00 0000");
    backend.set_export(xml_export());
    backend.insert_order(sent_order(10));
    let api = setup(provider, backend.clone());

    let result = api.poll_status(OrderId(10), PollOrigin::Scheduled).await.unwrap();
    assert_eq!(result.payment_state, PaymentState::Exported);
    assert_eq!(backend.state().method_lines.len(), 1);
}

#[tokio::test]
async fn manual_poll_without_code_defers_follow_up() {
    let op = OperationXml { code: "", status: "Importing", payment_reference: "", ..Default::default() };
    let provider = provider_returning(1, status_xml(&op));
    let backend = MemoryBackend::new().with_standard_accounting(VENDOR);
    backend.insert_order(sent_order(11));
    let api = setup(provider, backend.clone());

    let result = api.poll_status(OrderId(11), PollOrigin::Manual).await.unwrap();
    assert_eq!(result.lifecycle, LifecycleState::Pending);
    let note = backend.notes_for(OrderId(11)).pop().unwrap();
    assert!(note.starts_with("Infortisa status updated: Importing"));
    assert!(note.contains("Financial follow-up deferred"));
    assert!(note.contains("\nResponse: "));
    assert!(backend.state().bills.is_empty());
}

#[tokio::test]
async fn poll_errors_are_stored_and_reported() {
    let mut provider = MockProvider::new();
    provider.expect_order_status().times(1).returning(|_| http(503, "Service Unavailable"));
    let backend = MemoryBackend::new();
    backend.insert_order(sent_order(12));
    let api = setup(provider, backend.clone());
    let err = api.poll_status(OrderId(12), PollOrigin::Manual).await.unwrap_err();
    assert!(matches!(err, SyncError::Provider { status: 503, .. }));
    let snapshot = backend.snapshot(OrderId(12));
    assert_eq!(snapshot.last_response, "Service Unavailable");
    assert!(snapshot.last_polled_at.is_none());
}

#[tokio::test]
async fn poll_all_isolates_failures() {
    let ok = status_xml(&shipped());
    let mut provider = MockProvider::new();
    provider.expect_order_status().times(2).returning(move |reference| match reference {
        "S00014" => http(500, "boom"),
        _ => http(200, ok.clone()),
    });
    let backend = MemoryBackend::new();
    backend.insert_order(sent_order(13));
    backend.insert_order(sent_order(14));
    backend.insert_order(fulfillment_sync_engine::test_utils::sample_order(15, VENDOR));
    let api = setup(provider, backend.clone());

    let summary = api.poll_all().await.unwrap();
    assert_eq!(summary.total(), 2);
    assert_eq!(summary.polled.len(), 1);
    assert_eq!(summary.polled[0].order_id, OrderId(13));
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].0, OrderId(14));
    assert!(backend.notes_for(OrderId(14))[0].starts_with("Infortisa status poll failed"));
    assert_eq!(backend.snapshot(OrderId(13)).status_text, "Shipped");
    assert!(backend.snapshot(OrderId(15)).last_polled_at.is_none());
}

#[tokio::test]
async fn block_request_is_followed_by_a_poll() {
    let mut provider = MockProvider::new();
    provider.expect_block_order().times(1).returning(|body| {
        let xml = decode_body(&body);
        assert!(xml.contains("<CustomerReference>S00016</CustomerReference>"));
        assert!(xml.contains("<BlockOrder>true</BlockOrder>"));
        assert!(xml.contains("<CancelOrder>false</CancelOrder>"));
        http(200, "<BlockOrderResponse>OK</BlockOrderResponse>")
    });
    provider.expect_order_status().times(1).returning(|_| http(200, status_xml(&shipped())));
    let backend = MemoryBackend::new();
    backend.insert_order(sent_order(16));
    let api = setup(provider, backend.clone());

    let result = api.block_order(OrderId(16)).await.unwrap();
    assert_eq!(result.status, "Shipped");
    let notes = backend.notes_for(OrderId(16));
    assert_eq!(notes.len(), 2);
    assert!(notes[0].starts_with("Block request sent to Infortisa."));
    assert!(notes[1].starts_with("Infortisa status updated: Shipped"));
    assert!(backend.snapshot(OrderId(16)).last_payload.contains("<CancelOrder>false</CancelOrder>"));
}

#[tokio::test]
async fn cancel_requires_a_sent_order() {
    let mut provider = MockProvider::new();
    provider.expect_block_order().never();
    let backend = MemoryBackend::new();
    backend.insert_order(fulfillment_sync_engine::test_utils::sample_order(17, VENDOR));
    let api = setup(provider, backend.clone());
    let err = api.cancel_order(OrderId(17)).await.unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
}

#[tokio::test]
async fn oversized_quantities_do_not_stop_polling() {
    let huge = status_xml(&OperationXml { products: vec![("INF-001", "1E28", "100", "5")], ..shipped() });
    let ok = status_xml(&shipped());
    let mut provider = MockProvider::new();
    provider.expect_order_status().times(2).returning(move |reference| match reference {
        "S00016" => http(200, huge.clone()),
        _ => http(200, ok.clone()),
    });
    let backend = MemoryBackend::new();
    backend.insert_order(sent_order(16));
    backend.insert_order(sent_order(17));
    let api = setup(provider, backend.clone());

    let summary = api.poll_all().await.unwrap();
    assert_eq!(summary.polled.len(), 2);
    assert!(summary.failures.is_empty());
    let snapshot = backend.snapshot(OrderId(16));
    assert_eq!(snapshot.amounts.base, Money::zero());
    assert_eq!(snapshot.amounts.total, m("25"));
    assert_eq!(snapshot.status_text, "Shipped");
    assert_eq!(backend.snapshot(OrderId(17)).amounts.base, m("20"));
}

#[tokio::test]
async fn payable_order_is_not_billed_unless_enabled() {
    let provider = provider_returning(1, status_xml(&payable()));
    let backend = MemoryBackend::new().with_standard_accounting(VENDOR);
    backend.set_export(xml_export());
    backend.insert_order(sent_order(18));
    let config = SyncConfig { auto_create_bill: false, ..config() };
    assert!(!SyncConfig::default().auto_create_bill);
    fulfillment_sync_engine::test_utils::prepare_test_env();
    let api = FulfillmentSyncApi::new(provider, backend.clone(), config);

    let result = api.poll_status(OrderId(18), PollOrigin::Scheduled).await.unwrap();
    assert_eq!(result.lifecycle, LifecycleState::Payable);
    assert!(backend.snapshot(OrderId(18)).vendor_bill_id.is_none());
    let state = backend.state();
    assert!(state.bills.is_empty());
    assert!(state.payments.is_empty());
}

#[tokio::test]
async fn poll_needs_a_customer_reference() {
    let mut provider = MockProvider::new();
    provider.expect_order_status().never();
    let backend = MemoryBackend::new();
    let mut order = sent_order(19);
    order.sync.customer_reference = "  ".into();
    backend.insert_order(order);
    let api = setup(provider, backend.clone());

    let err = api.poll_status(OrderId(19), PollOrigin::Manual).await.unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
    assert!(backend.snapshot(OrderId(19)).last_polled_at.is_none());
}
