//! The network seam underneath the resilient client.

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use super::retry::FetchError;

/// Performs a single GET bound to a cancellation token.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the raw response body.
    ///
    /// Must return [`FetchError::Cancelled`] as soon as `cancel` fires.
    async fn get(&self, url: &str, cancel: &CancellationToken) -> Result<Bytes, FetchError>;
}

/// [`Transport`] backed by a `reqwest::Client`.
///
/// The HTTP status is not inspected. Error pages that carry a JSON body
/// decode like any other response, and ones that don't fail decoding.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_once(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self.client.get(url).send().await?;
        debug!("GET {} -> {}", url, response.status());
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, cancel: &CancellationToken) -> Result<Bytes, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.get_once(url) => result,
        }
    }
}
