//! Job DTOs for status reporting and commands

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CommandKind, ExecutionState, Job};
use crate::error::Result;

/// Status of a job as reported to API clients and callback receivers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_urn: String,
    pub state: ExecutionState,
    pub percent_done: f64,
    pub estimated_done: Option<DateTime<Utc>>,
    pub issued: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl JobStatus {
    /// Build the status view of `job` as seen at `now`
    pub fn from_job(job: &Job, now: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            job_urn: job.urn.clone(),
            state: job.plan_state()?.unwrap_or(ExecutionState::Queued),
            percent_done: percent_done(job, now)?,
            estimated_done: estimated_done(job),
            issued: job.issued,
            started: started(job),
            end_time: job.end_time,
        })
    }
}

/// Request to issue a command against a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub kind: CommandKind,
    pub urn: String,
    pub username: String,
}

pub(crate) fn started(job: &Job) -> Option<DateTime<Utc>> {
    job.plan
        .as_ref()
        .and_then(|plan| plan.tasks.first())
        .and_then(|task| task.start_time)
}

/// First task start plus the sum of all task estimations
pub(crate) fn estimated_done(job: &Job) -> Option<DateTime<Utc>> {
    let plan = job.plan.as_ref()?;
    started(job).map(|start| start + plan.total_estimation())
}

/// Elapsed time over total estimation, capped at 99 until the plan is Done
pub(crate) fn percent_done(job: &Job, now: DateTime<Utc>) -> Result<f64> {
    let Some(plan) = job.plan.as_ref() else {
        return Ok(0.0);
    };
    if plan.state()? == ExecutionState::Done {
        return Ok(100.0);
    }
    let Some(start) = started(job).filter(|start| *start <= now) else {
        return Ok(0.0);
    };
    Ok(ratio(now - start, plan.total_estimation()))
}

pub(crate) fn ratio(elapsed: TimeDelta, total: TimeDelta) -> f64 {
    if total <= TimeDelta::zero() {
        return 0.0;
    }
    let percent = elapsed.num_milliseconds() as f64 * 100.0 / total.num_milliseconds() as f64;
    if percent >= 100.0 { 99.0 } else { percent }
}
