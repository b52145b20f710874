//! Job completion callbacks
//!
//! Callback receivers get the same [`JobStatus`] view the API serves.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reel_core::domain::Job;
use reel_core::dto::job::JobStatus;
use reel_core::time::TimeProvider;
use reqwest::Client;
use tracing::{debug, error};

#[async_trait]
pub trait CallbackNotifier: Send + Sync {
    async fn notify(&self, job: &Job) -> anyhow::Result<()>;
}

/// POSTs the job status as JSON to the job's callback url
pub struct HttpCallbackNotifier {
    client: Client,
    clock: Arc<dyn TimeProvider>,
}

impl HttpCallbackNotifier {
    pub fn new(clock: Arc<dyn TimeProvider>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build callback HTTP client")?;
        Ok(Self { client, clock })
    }
}

#[async_trait]
impl CallbackNotifier for HttpCallbackNotifier {
    async fn notify(&self, job: &Job) -> anyhow::Result<()> {
        let Some(url) = job.callback_url.as_deref() else {
            return Ok(());
        };
        let status = JobStatus::from_job(job, self.clock.now())?;

        let response = self
            .client
            .post(url)
            .json(&status)
            .send()
            .await
            .with_context(|| format!("Failed to send callback to {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Callback rejected: {} - {}", status, body);
        }

        debug!(job = %job.urn, "Callback sent to {}", url);
        Ok(())
    }
}

/// Notify about `job` if it has a callback url, logging instead of failing
pub async fn notify_job(callbacks: &dyn CallbackNotifier, job: &Job) {
    let Some(url) = job.callback_url.as_deref() else {
        return;
    };
    if let Err(e) = callbacks.notify(job).await {
        error!(job = %job.urn, "Callback to {} failed: {:#}", url, e);
    }
}
