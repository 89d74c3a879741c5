//! Estimates provider access.
//!
//! The provider is reached through a [`Transport`], which only knows how to
//! issue a GET for a relative path. [`ProviderClient`] layers the shared
//! rate gate and response parsing on top.

pub mod http;

pub use http::HttpTransport;

use crate::gate::RateGate;
use crate::models::{Company, Release, ReleaseRecord};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Failure reported by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {path} failed: {message}")]
    Request { path: String, message: String },

    #[error("request to {path} returned HTTP {status}")]
    Status { path: String, status: u16 },
}

/// Errors from a provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("empty payload from {0}")]
    EmptyPayload(String),

    #[error("unparseable payload from {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Issues a single request. Does not throttle itself.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `path` relative to the provider base and return the body.
    async fn issue(&self, path: &str) -> Result<String, TransportError>;
}

/// Rate-gated, typed access to the provider.
#[derive(Clone)]
pub struct ProviderClient {
    transport: Arc<dyn Transport>,
    gate: Arc<RateGate>,
}

impl ProviderClient {
    pub fn new(transport: Arc<dyn Transport>, gate: Arc<RateGate>) -> Self {
        Self { transport, gate }
    }

    /// Path of the release list for one ticker.
    pub fn releases_path(ticker: &str) -> String {
        format!("companies/{}/releases", ticker)
    }

    /// Fetch the full company list.
    pub async fn companies(&self) -> Result<Vec<Company>, ProviderError> {
        let body = self.get("companies").await?;
        parse_body("companies", &body)
    }

    /// Fetch all releases for one ticker, in provider order.
    pub async fn releases(&self, ticker: &str) -> Result<Vec<Release>, ProviderError> {
        let path = Self::releases_path(ticker);
        let body = self.get(&path).await?;
        let records: Vec<ReleaseRecord> = parse_body(&path, &body)?;
        Ok(records.into_iter().map(Release::from).collect())
    }

    async fn get(&self, path: &str) -> Result<String, ProviderError> {
        self.gate.wait_to_proceed().await;
        debug!("GET {}", path);

        let body = self.transport.issue(path).await?;
        if body.trim().is_empty() {
            return Err(ProviderError::EmptyPayload(path.to_string()));
        }
        Ok(body)
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(path: &str, body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|source| ProviderError::Parse {
        path: path.to_string(),
        source,
    })
}


#[cfg(test)]
mod tests {
    use super::testing::FakeTransport;
    use super::*;
    use std::time::Duration;

    fn make_client(transport: FakeTransport) -> (ProviderClient, Arc<FakeTransport>) {
        let transport = Arc::new(transport);
        let gate = Arc::new(RateGate::new(100, Duration::from_secs(1)));
        (ProviderClient::new(transport.clone(), gate), transport)
    }

    #[tokio::test]
    async fn test_companies_parsed() {
        let (client, transport) = make_client(FakeTransport::new().with_body(
            "companies",
            r#"[{"name":"Apple","ticker":"AAPL"},{"name":"Old Co","ticker":"OLD-defunct-7"}]"#,
        ));

        let companies = client.companies().await.unwrap();
        assert_eq!(companies.len(), 2);
        assert_eq!(companies[1].ticker, "OLD-defunct-7");
        assert_eq!(transport.issued(), 1);
    }

    #[tokio::test]
    async fn test_releases_keep_order() {
        let body = r#"[
            {"id":"r2","release_date":"2020-02-01T21:00:00Z","fiscal_year":2020,"fiscal_quarter":1},
            {"id":"r1","release_date":"2019-11-01T21:00:00Z","fiscal_year":2019,"fiscal_quarter":4}
        ]"#;
        let (client, _) =
            make_client(FakeTransport::new().with_body(&ProviderClient::releases_path("AAPL"), body));

        let releases = client.releases("AAPL").await.unwrap();
        let ids: Vec<_> = releases.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r1"]);
    }

    #[tokio::test]
    async fn test_error_variants() {
        let (client, _) = make_client(
            FakeTransport::new()
                .with_body(&ProviderClient::releases_path("EMPTY"), "  ")
                .with_body(&ProviderClient::releases_path("JUNK"), "<html>")
                .with_fault(&ProviderClient::releases_path("DOWN")),
        );

        assert!(matches!(
            client.releases("EMPTY").await,
            Err(ProviderError::EmptyPayload(_))
        ));
        assert!(matches!(
            client.releases("JUNK").await,
            Err(ProviderError::Parse { .. })
        ));
        assert!(matches!(
            client.releases("DOWN").await,
            Err(ProviderError::Transport(TransportError::Request { .. }))
        ));
    }
}
