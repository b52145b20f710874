//! Dashboard DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::{estimated_done, percent_done, ratio, started};
use crate::domain::{ExecutionState, Job, Priority};
use crate::error::Result;
use crate::urn;

/// Overview of the job queue and registered plugins
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardInfo {
    pub waiting_jobs: Vec<DashboardJob>,
    pub active_jobs: Vec<DashboardJob>,
    pub recently_done_jobs: Vec<DashboardJob>,
    pub recently_failed_jobs: Vec<DashboardJob>,
    pub recently_canceled_jobs: Vec<DashboardJob>,
    pub plugins: Vec<DashboardPlugin>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardJob {
    pub urn: String,
    pub source_urn: Option<String>,
    pub name: String,
    pub current_plugin_urn: Option<String>,
    pub state: ExecutionState,
    pub percent_done: f64,
    pub task_progress: Vec<TaskProgress>,
    pub estimated_done: Option<DateTime<Utc>>,
    pub started: Option<DateTime<Utc>>,
    pub issued: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub due_date: DateTime<Utc>,
    pub duration_ms: u64,
    pub source_format: String,
    pub destination_format: String,
}

/// Progress of one task of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Plugin type running the task
    pub name: String,
    pub percent_of_total: u32,
    pub percent_done: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardPlugin {
    pub urn: String,
    pub plugin_type: String,
}

impl DashboardJob {
    pub fn from_job(job: &Job, now: DateTime<Utc>) -> Result<Self> {
        let current_plugin_urn = match job.plan.clone() {
            Some(mut plan) => plan.current_task()?.map(|task| task.plugin_urn.clone()),
            None => None,
        };
        let source_format = match &job.source.custom_format {
            Some(custom) if !custom.is_empty() => format!("{} ({})", job.source.format, custom),
            _ => job.source.format.to_string(),
        };

        Ok(Self {
            urn: job.urn.clone(),
            source_urn: job.source_urn.clone(),
            name: job.name.clone(),
            current_plugin_urn,
            state: job.plan_state()?.unwrap_or(ExecutionState::Queued),
            percent_done: percent_done(job, now)?,
            task_progress: task_progress(job, now),
            estimated_done: estimated_done(job),
            started: started(job),
            issued: job.issued,
            end_time: job.end_time,
            priority: job.priority,
            due_date: job.due_date,
            duration_ms: job.source.duration_ms,
            source_format,
            destination_format: job.destination.format.to_string(),
        })
    }
}

/// Per task progress, skipping instant tasks
fn task_progress(job: &Job, now: DateTime<Utc>) -> Vec<TaskProgress> {
    let Some(plan) = job.plan.as_ref() else {
        return vec![TaskProgress {
            name: "none".to_string(),
            percent_of_total: 0,
            percent_done: 0,
        }];
    };
    let total = plan.total_estimation();

    plan.tasks
        .iter()
        .filter(|task| task.estimation_ms != 0)
        .map(|task| {
            let percent_done = if task.state == ExecutionState::Done {
                100.0
            } else {
                match task.start_time.filter(|start| *start <= now) {
                    Some(start) => ratio(now - start, task.estimation()),
                    None => 0.0,
                }
            };
            TaskProgress {
                name: urn::plugin_type_from_urn(&task.plugin_urn)
                    .unwrap_or("unknown")
                    .to_string(),
                percent_of_total: (task.estimation_ms * 100)
                    .checked_div(total.num_milliseconds())
                    .unwrap_or(0) as u32,
                percent_done: percent_done as u32,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Essence, ExecutionPlan, ExecutionTask, MediaFormat};
    use chrono::TimeDelta;

    #[test]
    fn test_dashboard_job_view() {
        let now = Utc::now();
        let mut job = Job::new("clip", Essence::default(), Essence::default(), now);
        job.source.format = MediaFormat::Custom;
        job.source.custom_format = Some("ProRes".to_string());
        job.destination.format = MediaFormat::H264OdStandard;

        let mut first = ExecutionTask::new("urn:reel:plugin:ffmpeg:1", Essence::default(), Essence::default());
        first.set_estimation(TimeDelta::seconds(25));
        first.state = ExecutionState::Done;
        let mut second = ExecutionTask::new("urn:reel:plugin:wfs:1", Essence::default(), Essence::default());
        second.set_estimation(TimeDelta::seconds(75));
        second.state = ExecutionState::Running;
        second.start_time = Some(now);
        let mut plan = ExecutionPlan::new(vec![first, second]);
        plan.active_task_index = Some(1);
        job.plan = Some(plan);

        let view = DashboardJob::from_job(&job, now + TimeDelta::seconds(15)).unwrap();
        assert_eq!(view.current_plugin_urn.as_deref(), Some("urn:reel:plugin:wfs:1"));
        assert_eq!(view.source_format, "custom (ProRes)");
        assert_eq!(view.destination_format, "h264_od_standard");
        assert_eq!(
            view.task_progress,
            vec![
                TaskProgress { name: "ffmpeg".to_string(), percent_of_total: 25, percent_done: 100 },
                TaskProgress { name: "wfs".to_string(), percent_of_total: 75, percent_done: 20 },
            ]
        );
    }
}
