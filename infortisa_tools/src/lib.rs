//! Infortisa tools
//!
//! A thin async client for the Infortisa order API together with the XML codec for its payloads:
//! * [`OrderRequest`] and [`BlockRequest`] build the UTF-16 request documents.
//! * [`parse_acknowledgment`] and [`parse_status_response`] turn response bodies into typed reports. Status parsing
//!   never fails; unreadable responses are reported with status [`UNKNOWN_STATUS`].
//! * [`InfortisaApi`] sends the requests and hands back the raw [`ProviderResponse`].
mod api;
mod config;
mod error;
mod order_request;
mod order_response;
mod xml_tree;

pub use api::{InfortisaApi, ProviderResponse, BLOCK_ORDER_PATH, CREATE_ORDER_PATH, ORDER_STATUS_PATH};
pub use config::{InfortisaConfig, DEFAULT_INFORTISA_BASE_URL, DEFAULT_TIMEOUT};
pub use error::InfortisaApiError;
pub use order_request::{
    clean_comment,
    encode_utf16,
    sendable_products,
    truncate_chars,
    BlockRequest,
    OrderRequest,
    ProductRequest,
    RequestLine,
    ShippingAddress,
    DEFAULT_COMMENT,
    DEFAULT_COMPANY,
    MAX_COMMENT_LEN,
    SPECIAL_DESTINATION_SHOP,
};
pub use order_response::{
    find_ext_token,
    parse_acknowledgment,
    parse_status_response,
    Acknowledgment,
    OperationReport,
    ProductLine,
    StatusReport,
    TrackingReport,
    OPERATION_NAMESPACE,
    UNKNOWN_AGENT,
    UNKNOWN_STATUS,
};
pub use xml_tree::XmlElement;
