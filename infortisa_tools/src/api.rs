use std::{fmt::Debug, sync::Arc};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Client,
    Method,
};

use crate::{config::InfortisaConfig, InfortisaApiError};

pub const CREATE_ORDER_PATH: &str = "/api/order/create";
pub const ORDER_STATUS_PATH: &str = "/api/order/status";
pub const BLOCK_ORDER_PATH: &str = "/api/order/blockorder";

/// The raw outcome of an Infortisa call. Callers usually want to keep `body` for diagnostics even when the status
/// is not a success, so checking the status is left to [`ProviderResponse::ensure_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: String,
}

impl ProviderResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn ensure_status(&self, accepted: &[u16]) -> Result<(), InfortisaApiError> {
        if accepted.contains(&self.status) {
            Ok(())
        } else {
            Err(InfortisaApiError::QueryError { status: self.status, body: self.body.clone() })
        }
    }

    /// The first `max_chars` characters of the body, for audit notes.
    pub fn body_preview(&self, max_chars: usize) -> String {
        self.body.chars().take(max_chars).collect()
    }
}

#[derive(Clone)]
pub struct InfortisaApi {
    config: InfortisaConfig,
    client: Arc<Client>,
}

impl Debug for InfortisaApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InfortisaApi({:?})", self.config)
    }
}

impl InfortisaApi {
    pub fn new(config: InfortisaConfig) -> Result<Self, InfortisaApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| InfortisaApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &InfortisaConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// The API key is checked on every call rather than at construction, so a misconfigured installation still
    /// starts up and reports the problem against the order being processed.
    fn headers(&self) -> Result<HeaderMap, InfortisaApiError> {
        if self.config.api_key.is_blank() {
            return Err(InfortisaApiError::MissingApiKey);
        }
        let mut headers = HeaderMap::with_capacity(3);
        let val = HeaderValue::from_str(self.config.api_key.reveal().trim())
            .map_err(|e| InfortisaApiError::InvalidApiKey(e.to_string()))?;
        headers.insert("Authorization-Token", val);
        headers.insert(ACCEPT, HeaderValue::from_static("text/xml"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/xml; charset=utf-16"));
        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<Vec<u8>>,
    ) -> Result<ProviderResponse, InfortisaApiError> {
        let headers = self.headers()?;
        let url = self.url(path);
        trace!("📦️ Sending {method} {url}");
        let mut req = self.client.request(method, url).headers(headers);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.body(body);
        }
        let response = req.send().await.map_err(|e| InfortisaApiError::RequestError(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| InfortisaApiError::ResponseError(e.to_string()))?;
        trace!("📦️ {path} responded with HTTP {status}. {} bytes", body.len());
        Ok(ProviderResponse { status, body })
    }

    /// Submits an order. `body` must already be encoded (see [`crate::encode_utf16`]).
    pub async fn create_order(&self, body: Vec<u8>) -> Result<ProviderResponse, InfortisaApiError> {
        debug!("📦️ Submitting new order to Infortisa");
        self.send(Method::POST, CREATE_ORDER_PATH, &[], Some(body)).await
    }

    pub async fn order_status(&self, customer_reference: &str) -> Result<ProviderResponse, InfortisaApiError> {
        debug!("📦️ Fetching Infortisa status for {customer_reference}");
        self.send(Method::GET, ORDER_STATUS_PATH, &[("CustomerReference", customer_reference)], None).await
    }

    /// Blocks, unblocks or cancels an order, depending on the flags in the encoded `BlockOrder` document.
    pub async fn block_order(&self, body: Vec<u8>) -> Result<ProviderResponse, InfortisaApiError> {
        debug!("📦️ Sending block/cancel request to Infortisa");
        self.send(Method::POST, BLOCK_ORDER_PATH, &[], Some(body)).await
    }
}
