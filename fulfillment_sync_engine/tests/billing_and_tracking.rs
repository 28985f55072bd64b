use fulfillment_sync_engine::{
    sync_types::{OrderId, SalesOrder},
    test_utils::{prepare_test_env, status_xml, MemoryBackend, OperationXml},
    traits::data_objects::JournalKind,
    FulfillmentSyncApi,
    PollOrigin,
    SyncConfig,
    SyncError,
};

mod support;
use support::*;

/// A sent order whose Infortisa figures are already known.
fn priced_order(id: i64) -> SalesOrder {
    let mut order = sent_order(id);
    order.sync.op_code = "PR/1".into();
    order.sync.transfer_ref = "TR-1".into();
    order.sync.amounts.base = "20".parse().unwrap();
    order.sync.amounts.shipping = "4.5".parse().unwrap();
    order
}

fn tracked_order(id: i64) -> SalesOrder {
    let mut order = sent_order(id);
    order.sync.tracking.url = "https://track.example/1".into();
    order.sync.tracking.agent = "SEUR".into();
    order
}

#[tokio::test]
async fn vendor_bill_is_created_and_linked() {
    let backend = MemoryBackend::new().with_standard_accounting(VENDOR);
    backend.insert_order(priced_order(1));
    let api = setup(MockProvider::new(), backend.clone());

    let bill_id = api.create_vendor_bill(OrderId(1)).await.unwrap();
    assert_eq!(backend.snapshot(OrderId(1)).vendor_bill_id, Some(bill_id));
    {
        let state = backend.state();
        let request = &state.bill_requests[0];
        assert_eq!(request.partner_id, VENDOR);
        assert_eq!(request.origin, "S00001");
        assert_eq!(request.currency, "EUR");
        assert_eq!(request.payment_reference.as_deref(), Some("TR-1"));
        assert_eq!(request.lines.len(), 2);
        assert_eq!(request.total(), "24.5".parse().unwrap());
    }
    assert_eq!(backend.notes_for(OrderId(1)), vec![format!("Vendor bill {bill_id} created for S00001")]);

    let err = api.create_vendor_bill(OrderId(1)).await.unwrap_err();
    assert!(matches!(err, SyncError::BillAlreadyExists(id) if id == bill_id));
    assert_eq!(backend.state().bills.len(), 1);
}

#[tokio::test]
async fn bill_needs_a_configured_vendor() {
    prepare_test_env();
    let backend = MemoryBackend::new().with_standard_accounting(VENDOR);
    backend.insert_order(priced_order(2));
    let config = SyncConfig { vendor_id: None, ..config() };
    let api = FulfillmentSyncApi::new(MockProvider::new(), backend.clone(), config);
    let err = api.create_vendor_bill(OrderId(2)).await.unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));
    assert!(backend.state().bills.is_empty());
}

#[tokio::test]
async fn bill_needs_a_purchase_journal() {
    let backend = MemoryBackend::new();
    backend.add_journal("Banco Principal", "BNK5", JournalKind::Bank);
    backend.insert_order(priced_order(3));
    let api = setup(MockProvider::new(), backend.clone());
    let err = api.create_vendor_bill(OrderId(3)).await.unwrap_err();
    match err {
        SyncError::Configuration(msg) => assert!(msg.contains("purchase journal")),
        e => panic!("Unexpected error: {e}"),
    }
}

#[tokio::test]
async fn bill_needs_positive_amounts() {
    let backend = MemoryBackend::new().with_standard_accounting(VENDOR);
    backend.insert_order(sent_order(4));
    let api = setup(MockProvider::new(), backend.clone());
    let err = api.create_vendor_bill(OrderId(4)).await.unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));
    assert!(backend.snapshot(OrderId(4)).vendor_bill_id.is_none());
}

#[tokio::test]
async fn new_transfer_reference_is_stamped_on_the_bill() {
    let op = OperationXml {
        code: "PR/1",
        status: "Shipped",
        payment_reference: "TR-2",
        shipping: "4.50",
        products: vec![("INF-001", "2", "10.00", "0")],
        ..Default::default()
    };
    let mut provider = MockProvider::new();
    provider.expect_order_status().times(1).returning(move |_| http(200, status_xml(&op)));
    let backend = MemoryBackend::new().with_standard_accounting(VENDOR);
    backend.insert_order(priced_order(5));
    let api = setup(provider, backend.clone());

    let bill_id = api.create_vendor_bill(OrderId(5)).await.unwrap();
    assert_eq!(backend.state().bills[&bill_id].payment_reference, "TR-1");

    let result = api.poll_status(OrderId(5), PollOrigin::Scheduled).await.unwrap();
    assert!(result.changes.contains(&"Transfer reference: TR-1 -> TR-2".to_string()));
    assert!(result.changes.contains(&format!("Vendor bill {bill_id} reference set to TR-2")));
    let state = backend.state();
    assert_eq!(state.bills[&bill_id].payment_reference, "TR-2");
    assert_eq!(state.bills[&bill_id].reference, "TR-2");
}

#[tokio::test]
async fn tracking_notification_rules() {
    let backend = MemoryBackend::new();
    backend.insert_order(sent_order(6));
    backend.insert_order(tracked_order(7));
    let api = setup(MockProvider::new(), backend.clone());

    let err = api.notify_tracking(OrderId(6)).await.unwrap_err();
    assert!(matches!(err, SyncError::NoTracking));
    let err = api.resend_tracking(OrderId(6)).await.unwrap_err();
    assert!(matches!(err, SyncError::NoTracking));

    api.notify_tracking(OrderId(7)).await.unwrap();
    assert!(backend.snapshot(OrderId(7)).tracking.notified);
    let messages = backend.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].recipient_email.as_deref(), Some("ana@example.com"));
    assert!(messages[0].body.contains("SEUR"));

    let err = api.notify_tracking(OrderId(7)).await.unwrap_err();
    assert!(matches!(err, SyncError::AlreadyNotified));
    assert_eq!(backend.messages().len(), 1);
}

#[tokio::test]
async fn resending_tracking_leaves_the_flag_alone() {
    let backend = MemoryBackend::new();
    backend.insert_order(tracked_order(8));
    let api = setup(MockProvider::new(), backend.clone());

    api.resend_tracking(OrderId(8)).await.unwrap();
    assert!(!backend.snapshot(OrderId(8)).tracking.notified);
    api.notify_tracking(OrderId(8)).await.unwrap();
    api.resend_tracking(OrderId(8)).await.unwrap();
    assert!(backend.snapshot(OrderId(8)).tracking.notified);
    assert_eq!(backend.messages().len(), 3);
    let notes = backend.notes_for(OrderId(8));
    assert!(notes[0].starts_with("Tracking details sent again to the customer"));
    assert!(notes[1].starts_with("Tracking details sent to the customer"));
}

#[tokio::test]
async fn tracking_needs_a_customer() {
    let backend = MemoryBackend::new();
    let mut order = tracked_order(9);
    order.customer = None;
    backend.insert_order(order);
    let api = setup(MockProvider::new(), backend.clone());
    let err = api.notify_tracking(OrderId(9)).await.unwrap_err();
    assert!(matches!(err, SyncError::Notification(_)));
    assert!(!backend.snapshot(OrderId(9)).tracking.notified);
}

#[tokio::test]
async fn raw_exchange_returns_the_last_documents() {
    let backend = MemoryBackend::new();
    let mut order = sent_order(10);
    order.sync.last_payload = "<Order/>".into();
    order.sync.last_response = "<OrderResponse/>".into();
    backend.insert_order(order);
    let api = setup(MockProvider::new(), backend.clone());
    let raw = api.raw_exchange(OrderId(10)).await.unwrap();
    assert_eq!(raw.payload, "<Order/>");
    assert_eq!(raw.response, "<OrderResponse/>");
}
