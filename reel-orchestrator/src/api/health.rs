//! Health Check API Handlers
//!
//! Liveness, pulse, storage, lease and job outcome endpoints for monitoring.
//! Each check answers 503 with its report when unhealthy.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use super::AppState;
use crate::api::error::ApiResult;
use crate::engine::SEMAPHORE_ID;
use crate::health::{self, JobsReport, PulseReport, SemaphoreReport};

#[derive(Debug, Serialize)]
pub struct StoreReport {
    pub healthy: bool,
    pub newest_job: Option<String>,
    pub error: Option<String>,
}

fn status_of(healthy: bool) -> StatusCode {
    if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /health/pulse
/// 503 while pulse failures fall inside the health window
pub async fn pulse_health(State(state): State<AppState>) -> (StatusCode, Json<PulseReport>) {
    let report = state.health.report(state.clock.now());
    (status_of(report.healthy), Json(report))
}

/// GET /health/store
/// Whether the job store answers, with the newest job it holds
pub async fn store_health(State(state): State<AppState>) -> (StatusCode, Json<StoreReport>) {
    let report = match state.jobs.newest().await {
        Ok(newest) => StoreReport {
            healthy: true,
            newest_job: newest.map(|job| job.urn),
            error: None,
        },
        Err(e) => {
            tracing::error!("Job store health check failed: {}", e);
            StoreReport {
                healthy: false,
                newest_job: None,
                error: Some(e.to_string()),
            }
        }
    };
    (status_of(report.healthy), Json(report))
}

/// GET /health/semaphore
/// 503 when no executor refreshed the leader lease within its max age
pub async fn semaphore_health(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<SemaphoreReport>)> {
    let lease = state.semaphores.probe(SEMAPHORE_ID).await?;
    let report = health::semaphore_report(lease.as_ref(), state.clock.now(), state.semaphores.max_age());
    Ok((status_of(report.healthy), Json(report)))
}

/// GET /health/jobs
/// 503 when too many of the recently finished jobs failed
pub async fn jobs_health(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<JobsReport>)> {
    let since = state.clock.now() - state.jobs_health.window;
    let done = state.jobs.done_jobs(Some(since)).await?;
    let failed = state.jobs.failed_jobs(Some(since)).await?;
    let report = state.jobs_health.evaluate(&done, &failed);
    Ok((status_of(report.healthy), Json(report)))
}
