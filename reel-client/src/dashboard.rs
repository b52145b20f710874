//! Dashboard and executor endpoints

use chrono::{DateTime, SecondsFormat, Utc};
use reel_core::domain::ExecutorStatus;
use reel_core::dto::dashboard::DashboardInfo;

use crate::OrchestratorClient;
use crate::error::Result;

impl OrchestratorClient {
    /// Job overview, finished jobs filtered by end time
    ///
    /// The orchestrator defaults `since` to one hour ago.
    pub async fn dashboard(&self, since: Option<DateTime<Utc>>) -> Result<DashboardInfo> {
        let url = match since {
            Some(since) => format!(
                "{}/dashboard?since={}",
                self.base_url,
                since.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            None => format!("{}/dashboard", self.base_url),
        };
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    pub async fn executor_status(&self) -> Result<ExecutorStatus> {
        let url = format!("{}/executor/status", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
