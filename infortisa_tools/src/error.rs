use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum InfortisaApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The Infortisa API key is not configured")]
    MissingApiKey,
    #[error("Invalid API key header value: {0}")]
    InvalidApiKey(String),
    #[error("Request to Infortisa failed: {0}")]
    RequestError(String),
    #[error("Could not read Infortisa response: {0}")]
    ResponseError(String),
    #[error("Infortisa returned HTTP {status}: {body}")]
    QueryError { status: u16, body: String },
    #[error("Infortisa reported errors: {0}")]
    ProviderError(String),
    #[error("Invalid order request: {0}")]
    Validation(String),
    #[error("XML error: {0}")]
    XmlError(String),
}

impl From<quick_xml::Error> for InfortisaApiError {
    fn from(e: quick_xml::Error) -> Self {
        Self::XmlError(e.to_string())
    }
}
