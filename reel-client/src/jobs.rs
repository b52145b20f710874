//! Job-related API endpoints

use reel_core::domain::CommandKind;
use reel_core::dto::job::{CommandRequest, JobStatus};
use reel_core::dto::order::Order;

use crate::OrchestratorClient;
use crate::error::Result;

impl OrchestratorClient {
    /// Submit a transcoding order
    ///
    /// # Returns
    /// The status of the created, still waiting, job
    pub async fn order(&self, order: &Order) -> Result<JobStatus> {
        tracing::debug!("Submitting order for {}", order.file_path);
        let url = format!("{}/job/order", self.base_url);
        let response = self.client.post(&url).json(order).send().await?;

        self.handle_response(response).await
    }

    /// Queue a command against a job
    ///
    /// The command is carried out on the executor's next pulse.
    pub async fn command(&self, req: &CommandRequest) -> Result<JobStatus> {
        tracing::debug!("Sending {} command for {}", req.kind.as_str(), req.urn);
        let url = format!("{}/job/command", self.base_url);
        let response = self.client.post(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    pub async fn cancel(&self, job_urn: &str, username: &str) -> Result<JobStatus> {
        self.command(&CommandRequest {
            kind: CommandKind::Cancel,
            urn: job_urn.to_string(),
            username: username.to_string(),
        })
        .await
    }

    pub async fn job_status(&self, job_urn: &str) -> Result<JobStatus> {
        let url = format!("{}/job/{}", self.base_url, job_urn);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
