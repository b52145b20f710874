//! Reel HTTP Client
//!
//! A type-safe HTTP client for the Reel orchestrator API, shared by the CLI
//! and any service submitting transcoding orders.
//!
//! # Example
//!
//! ```no_run
//! use reel_client::OrchestratorClient;
//! use reel_core::domain::MediaFormat;
//! use reel_core::dto::order::Order;
//!
//! #[tokio::main]
//! async fn main() -> reel_client::Result<()> {
//!     let client = OrchestratorClient::new("http://localhost:8080");
//!
//!     let status = client.order(&Order {
//!         file_path: "/media/in/clip.mxf".to_string(),
//!         source_format: MediaFormat::Xd5c,
//!         duration_ms: 60_000,
//!         destination_format: MediaFormat::H264OdStandard,
//!         destination_path: "/media/out".to_string(),
//!         ..Default::default()
//!     }).await?;
//!
//!     println!("Ordered job: {}", status.job_urn);
//!     Ok(())
//! }
//! ```

mod dashboard;
pub mod error;
mod jobs;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use reel_core::dto::job::JobStatus;

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Reel orchestrator API
///
/// Endpoints are grouped into:
/// - Jobs (order, command, status)
/// - Dashboard and executor status
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the orchestrator API (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    ///
    /// Error bodies of the shape `{"error": "..."}` are unwrapped into the
    /// message of [`ClientError::ApiError`].
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_message(&error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("error")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
