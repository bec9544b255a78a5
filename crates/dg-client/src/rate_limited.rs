use std::future::Future;
use std::sync::Arc;

use dg_config::Config;
use dg_core::RateLimiter;
use dg_types::{Document, Result};

use crate::DocumentClient;

/// [`DocumentClient`] behind a shared [`RateLimiter`].
///
/// Only accepted documents count toward the limit; a rejected or failed post
/// gives its slot back.
#[derive(Clone)]
pub struct RateLimitedClient {
    client: DocumentClient,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedClient {
    pub fn new(client: DocumentClient, limiter: Arc<RateLimiter>) -> Self {
        Self { client, limiter }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = DocumentClient::new(config)?;
        let limiter = Arc::new(RateLimiter::from_config(config)?);
        Ok(Self::new(client, limiter))
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Submit a document, waiting for a free slot first.
    pub async fn create_document(&self, document: &Document, signature: &str) -> Result<()> {
        self.limiter
            .execute(|| self.client.create_document(document, signature))
            .await
    }

    /// Submit a document, giving up with `DocGateError::Cancelled` if `cancel`
    /// resolves before a slot frees.
    pub async fn create_document_cancellable<C>(
        &self,
        document: &Document,
        signature: &str,
        cancel: C,
    ) -> Result<()>
    where
        C: Future<Output = ()>,
    {
        self.limiter
            .execute_cancellable(cancel, || {
                self.client.create_document(document, signature)
            })
            .await
            .map_err(Into::into)
    }
}
