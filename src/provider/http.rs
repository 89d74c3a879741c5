//! HTTP transport for the estimates provider.

use super::{Transport, TransportError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::time::Duration;
use tracing::{debug, info};

/// Header carrying the provider API key.
const API_KEY_HEADER: &str = "x-estimize-key";

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

/// `reqwest`-backed transport. Throttling is the caller's job.
pub struct HttpTransport {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> anyhow::Result<Self> {
        info!("Provider endpoint: {}", config.base_url);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(ref key) = config.api_key {
            let mut value = HeaderValue::from_str(key)?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Absolute URL for a provider-relative path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn issue(&self, path: &str) -> Result<String, TransportError> {
        let url = self.url_for(path);
        debug!("Requesting {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| TransportError::Request {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}
