use infortisa_tools::{InfortisaApi, InfortisaApiError, ProviderResponse};

/// The remote fulfillment provider. Bodies are handed over already encoded, and responses are returned without
/// their status being checked so that callers can record them verbatim.
#[allow(async_fn_in_trait)]
pub trait FulfillmentProvider {
    async fn submit_order(&self, body: Vec<u8>) -> Result<ProviderResponse, InfortisaApiError>;

    async fn order_status(&self, customer_reference: &str) -> Result<ProviderResponse, InfortisaApiError>;

    async fn block_order(&self, body: Vec<u8>) -> Result<ProviderResponse, InfortisaApiError>;
}

impl FulfillmentProvider for InfortisaApi {
    async fn submit_order(&self, body: Vec<u8>) -> Result<ProviderResponse, InfortisaApiError> {
        self.create_order(body).await
    }

    async fn order_status(&self, customer_reference: &str) -> Result<ProviderResponse, InfortisaApiError> {
        InfortisaApi::order_status(self, customer_reference).await
    }

    async fn block_order(&self, body: Vec<u8>) -> Result<ProviderResponse, InfortisaApiError> {
        InfortisaApi::block_order(self, body).await
    }
}
