//! Dashboard API Handler

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, TimeDelta, Utc};
use reel_core::domain::Job;
use reel_core::dto::dashboard::{DashboardInfo, DashboardJob, DashboardPlugin};
use serde::Deserialize;

use super::AppState;
use crate::api::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    /// Oldest end time of finished jobs to include, default one hour ago
    pub since: Option<DateTime<Utc>>,
}

/// GET /dashboard
/// Waiting and active jobs, recently finished jobs and registered plugins
pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardQuery>,
) -> ApiResult<Json<DashboardInfo>> {
    let now = state.clock.now();
    let since = params.since.unwrap_or(now - TimeDelta::hours(1));
    tracing::debug!("Building dashboard since {}", since);

    let views = |jobs: Vec<Job>| -> ApiResult<Vec<DashboardJob>> {
        jobs.iter()
            .map(|job| DashboardJob::from_job(job, now).map_err(Into::into))
            .collect()
    };

    let plugins = state
        .executor
        .status()
        .await
        .plugins
        .into_iter()
        .map(|plugin| DashboardPlugin {
            urn: plugin.urn,
            plugin_type: plugin.plugin_type,
        })
        .collect();

    Ok(Json(DashboardInfo {
        waiting_jobs: views(state.jobs.waiting_jobs().await?)?,
        active_jobs: views(state.jobs.active_jobs().await?)?,
        recently_done_jobs: views(state.jobs.done_jobs(Some(since)).await?)?,
        recently_failed_jobs: views(state.jobs.failed_jobs(Some(since)).await?)?,
        recently_canceled_jobs: views(state.jobs.canceled_jobs(Some(since)).await?)?,
        plugins,
    }))
}
