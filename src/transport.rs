//! Delivery transport collaborator.
//!
//! One `send` performs exactly one attempt for one record. The scheduler
//! retries the same record until the transport confirms receipt, so an
//! implementation must tolerate repeated sends of an identical record.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::event::EventRecord;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server returned status {0}")]
    Status(u16),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, record: &EventRecord) -> Result<(), TransportError>;
}

/// POSTs each record as JSON to a fixed endpoint; any 2xx counts as receipt.
///
/// The request timeout lives here, not in the scheduler: a stalled request
/// surfaces as a `Network` failure and goes back through the retry loop.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(endpoint: Url) -> Result<Self, TransportError> {
        Self::with_timeout(endpoint, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: Url, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, record: &EventRecord) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(record)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(())
    }
}
