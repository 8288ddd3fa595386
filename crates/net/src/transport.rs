//! HTTP transport for relay requests

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::protocol::RawResponse;

/// Issues a single GET and hands back the raw answer.
///
/// Implementations never retry; retry policy belongs to the callers of
/// the relay client.
pub trait Transport: Send + Sync + 'static {
    fn get(&self, url: &str) -> impl Future<Output = Result<RawResponse>> + Send;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::from_reqwest)?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<RawResponse> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", url, e)))?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let http_status = response.status().as_u16();
        let body = response.text().await.map_err(TransportError::from_reqwest)?;
        debug!(http_status, len = body.len(), "Relay answered");

        Ok(RawResponse::new(http_status, body))
    }
}
