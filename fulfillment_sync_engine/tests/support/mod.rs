#![allow(dead_code)]
use fulfillment_sync_engine::{
    sync_types::{PartnerId, ProductId, SalesOrder},
    test_utils::{prepare_test_env, sample_order, MemoryBackend},
    traits::FulfillmentProvider,
    FulfillmentSyncApi,
    SyncConfig,
};
use infortisa_tools::{InfortisaApiError, ProviderResponse, OPERATION_NAMESPACE};
use mockall::mock;

pub const VENDOR: PartnerId = PartnerId(500);

mock! {
    pub Provider {}
    impl FulfillmentProvider for Provider {
        async fn submit_order(&self, body: Vec<u8>) -> Result<ProviderResponse, InfortisaApiError>;
        async fn order_status(&self, customer_reference: &str) -> Result<ProviderResponse, InfortisaApiError>;
        async fn block_order(&self, body: Vec<u8>) -> Result<ProviderResponse, InfortisaApiError>;
    }
}

pub fn config() -> SyncConfig {
    SyncConfig {
        vendor_id: Some(VENDOR),
        purchase_product_id: Some(ProductId(70)),
        shipping_product_id: Some(ProductId(71)),
        auto_create_bill: true,
        ..Default::default()
    }
}

pub fn ack(internal_reference: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><OrderResponse xmlns="{OPERATION_NAMESPACE}"><HasErrors>false</HasErrors><InternalReference>{internal_reference}</InternalReference></OrderResponse>"#
    )
}

/// An eligible order that Infortisa already knows about.
pub fn sent_order(id: i64) -> SalesOrder {
    let mut order = sample_order(id, VENDOR);
    order.sync.customer_reference = order.default_customer_reference();
    order.sync.sent = true;
    order.sync.allowed = true;
    order
}

pub fn setup(provider: MockProvider, backend: MemoryBackend) -> FulfillmentSyncApi<MockProvider, MemoryBackend> {
    prepare_test_env();
    FulfillmentSyncApi::new(provider, backend, config())
}

pub fn http(status: u16, body: impl Into<String>) -> Result<ProviderResponse, InfortisaApiError> {
    Ok(ProviderResponse::new(status, body))
}

/// Decodes a UTF-16LE request body with BOM.
pub fn decode_body(body: &[u8]) -> String {
    let units = body[2..].chunks(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect::<Vec<u16>>();
    String::from_utf16_lossy(&units)
}
