//! Job API Handlers
//!
//! Order intake, commands and status lookups.

use axum::{
    Json,
    extract::{Path, State},
};
use reel_core::domain::{Command, CommandKind};
use reel_core::dto::job::{CommandRequest, JobStatus};
use reel_core::dto::order::Order;
use reel_core::urn;

use super::AppState;
use crate::api::error::{ApiError, ApiResult};

/// POST /job/order
/// Validate an order and store it as a waiting job
pub async fn submit_order(
    State(state): State<AppState>,
    Json(order): Json<Order>,
) -> ApiResult<Json<JobStatus>> {
    let now = state.clock.now();
    let job = order.into_job(now)?;
    let job = state.jobs.add(job).await?;

    tracing::info!(job = %job.urn, "Order accepted: {}", job.name);
    Ok(Json(JobStatus::from_job(&job, now)?))
}

/// POST /job/command
/// Queue a command for the executor's next pulse
pub async fn submit_command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> ApiResult<Json<JobStatus>> {
    check_job_urn(&req.urn)?;
    if req.kind == CommandKind::Unknown {
        return Err(ApiError::BadRequest("Unknown command".to_string()));
    }
    if req.username.trim().is_empty() {
        return Err(ApiError::BadRequest("username is required".to_string()));
    }

    let job = state
        .jobs
        .get(&req.urn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job {} not found", req.urn)))?;
    if let Some(plan_state) = job.plan_state()?
        && plan_state.is_terminal()
    {
        return Err(ApiError::BadRequest(format!(
            "Job {} is already {}",
            job.urn, plan_state
        )));
    }

    state
        .commands
        .add(Command {
            kind: req.kind,
            urn: req.urn,
            username: req.username,
        })
        .await?;

    tracing::info!(job = %job.urn, "Command {} queued", req.kind.as_str());
    Ok(Json(JobStatus::from_job(&job, state.clock.now())?))
}

/// GET /job/{urn}
/// Get the status of a job
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_urn): Path<String>,
) -> ApiResult<Json<JobStatus>> {
    tracing::debug!("Getting job: {}", job_urn);
    check_job_urn(&job_urn)?;

    let job = state
        .jobs
        .get(&job_urn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job {} not found", job_urn)))?;

    Ok(Json(JobStatus::from_job(&job, state.clock.now())?))
}

fn check_job_urn(job_urn: &str) -> ApiResult<()> {
    if urn::validate_urn(job_urn, "job:") {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("Invalid job urn: {}", job_urn)))
    }
}
