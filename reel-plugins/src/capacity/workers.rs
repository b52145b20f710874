//! Worker count sources for shared capacity pools

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

/// Reports how many workers a remote pool currently has
#[async_trait]
pub trait WorkerCountSource: Send + Sync {
    async fn worker_count(&self) -> Result<usize>;
}

/// Static worker count
#[derive(Debug, Clone, Copy)]
pub struct FixedWorkers(pub usize);

#[async_trait]
impl WorkerCountSource for FixedWorkers {
    async fn worker_count(&self) -> Result<usize> {
        Ok(self.0)
    }
}

/// Worker count read from a JSON health endpoint
///
/// The count is taken from `pointer` (RFC 6901) in the response body, e.g.
/// `/workers/active`.
pub struct HttpWorkerCount {
    client: Client,
    url: String,
    pointer: String,
}

impl HttpWorkerCount {
    /// Creates a source polling `url`
    ///
    /// # Arguments
    /// * `url` - Health endpoint of the remote pool
    /// * `pointer` - JSON pointer to the worker count
    /// * `timeout` - Request timeout
    pub fn new(url: impl Into<String>, pointer: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
            pointer: pointer.into(),
        })
    }
}

#[async_trait]
impl WorkerCountSource for HttpWorkerCount {
    async fn worker_count(&self) -> Result<usize> {
        let body: serde_json::Value = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("Failed to send worker count request")?
            .error_for_status()
            .context("Worker count endpoint returned an error")?
            .json()
            .await
            .context("Failed to parse worker count response")?;

        let count = body
            .pointer(&self.pointer)
            .and_then(serde_json::Value::as_u64)
            .with_context(|| format!("No unsigned integer at {} in response", self.pointer))?;
        Ok(count as usize)
    }
}
