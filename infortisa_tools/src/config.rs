use std::time::Duration;

use fsg_common::Secret;
use log::*;

pub const DEFAULT_INFORTISA_BASE_URL: &str = "https://apiv2.infortisa.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct InfortisaConfig {
    /// Scheme and host of the Infortisa API, without a trailing slash.
    pub base_url: String,
    /// Sent verbatim in the `Authorization-Token` header. An empty key is allowed at construction time, but every
    /// request will then fail with [`crate::InfortisaApiError::MissingApiKey`].
    pub api_key: Secret<String>,
    pub timeout: Duration,
}

impl Default for InfortisaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INFORTISA_BASE_URL.to_string(),
            api_key: Secret::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl InfortisaConfig {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: Secret::new(api_key.to_string()),
            ..Default::default()
        }
    }

    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("FSG_INFORTISA_BASE_URL").unwrap_or_else(|_| {
            info!("FSG_INFORTISA_BASE_URL not set, using {DEFAULT_INFORTISA_BASE_URL}");
            DEFAULT_INFORTISA_BASE_URL.to_string()
        });
        let api_key = Secret::new(std::env::var("FSG_INFORTISA_API_KEY").unwrap_or_else(|_| {
            warn!("FSG_INFORTISA_API_KEY not set. Requests to Infortisa will be refused until it is configured.");
            String::default()
        }));
        let timeout = std::env::var("FSG_INFORTISA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| error!("Invalid FSG_INFORTISA_TIMEOUT_SECS value: {s}. {e}. Using the default."))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        Self { base_url: base_url.trim_end_matches('/').to_string(), api_key, timeout }
    }
}
