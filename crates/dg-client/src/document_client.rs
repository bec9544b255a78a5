//! HTTP client for the document creation endpoint.
//!
//! Serializes a [`Document`] to JSON, signs the request with the
//! `X-Signature` header and treats anything but `200 OK` as a failure.

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::{debug, warn};

use dg_config::Config;
use dg_types::{DocGateError, Document, Result};

const SIGNATURE_HEADER: &str = "X-Signature";

/// Document creation API client.
#[derive(Debug, Clone)]
pub struct DocumentClient {
    http: reqwest::Client,
    api_url: String,
}

impl DocumentClient {
    /// Build a client with the endpoint and timeouts from `config`.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .build()
            .map_err(|e| DocGateError::Http(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// POST one document. Not rate limited on its own; see
    /// [`RateLimitedClient`](crate::RateLimitedClient).
    pub async fn create_document(&self, document: &Document, signature: &str) -> Result<()> {
        let body = document.to_bytes()?;

        let response = self
            .http
            .post(&self.api_url)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| DocGateError::Http(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(url = %self.api_url, status = status.as_u16(), "Document creation rejected");
            return Err(DocGateError::Api {
                status: status.as_u16(),
            });
        }

        debug!(url = %self.api_url, "Document created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_uses_configured_url() {
        let cfg = Config {
            api_url: "http://localhost:9999/create".to_string(),
            ..Default::default()
        };
        let client = DocumentClient::new(&cfg).unwrap();
        assert_eq!(client.api_url(), "http://localhost:9999/create");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_http_error() {
        let cfg = Config {
            // Port 9 (discard) is practically never listening locally.
            api_url: "http://127.0.0.1:9/create".to_string(),
            connect_timeout_ms: 500,
            read_timeout_ms: 1_000,
            ..Default::default()
        };
        let client = DocumentClient::new(&cfg).unwrap();

        let err = client
            .create_document(&Document::new(), "sig")
            .await
            .unwrap_err();
        assert!(matches!(err, DocGateError::Http(_)));
    }
}
