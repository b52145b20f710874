//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::essence::Essence;
use super::plan::ExecutionPlan;
use super::task::ExecutionState;
use crate::error::Result;
use crate::urn;

/// Transcoding job
///
/// A job is waiting while it has no plan, active while its plan is Queued or
/// Running, and terminal once the plan is Done, Failed or Canceled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub urn: String,
    pub source_urn: Option<String>,
    pub name: String,
    pub source: Essence,
    pub destination: Essence,
    pub priority: Priority,
    pub issued: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub callback_url: Option<String>,
    pub plan: Option<ExecutionPlan>,
    /// Stamped by the repository on every write
    pub last_modified: DateTime<Utc>,
}

impl Job {
    /// Create a waiting job issued at `now`
    pub fn new(name: impl Into<String>, source: Essence, destination: Essence, now: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            urn: urn::new_urn("job", id),
            source_urn: None,
            name: name.into(),
            source,
            destination,
            priority: Priority::Low,
            issued: now,
            due_date: now,
            end_time: None,
            callback_url: None,
            plan: None,
            last_modified: now,
        }
    }

    /// Aggregate plan state, `None` while the job is waiting
    pub fn plan_state(&self) -> Result<Option<ExecutionState>> {
        self.plan.as_ref().map(|plan| plan.state()).transpose()
    }

    pub fn is_waiting(&self) -> bool {
        self.plan.is_none()
    }
}

/// Job priority
///
/// Ordering follows declaration order so `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    /// Numeric weight used by persistence
    pub fn weight(&self) -> i16 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 5,
            Priority::High => 10,
        }
    }

    pub fn from_weight(weight: i16) -> Self {
        match weight {
            w if w >= 10 => Priority::High,
            w if w >= 5 => Priority::Medium,
            _ => Priority::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::ExecutionTask;

    #[test]
    fn test_priority_order() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        for priority in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(Priority::from_weight(priority.weight()), priority);
        }
    }

    #[test]
    fn test_plan_state_of_waiting_job() {
        let mut job = Job::new("clip", Essence::default(), Essence::default(), Utc::now());
        assert!(job.is_waiting());
        assert_eq!(job.plan_state().unwrap(), None);

        job.plan = Some(ExecutionPlan::new(vec![ExecutionTask::new(
            "urn:reel:plugin:dummy:1",
            Essence::default(),
            Essence::default(),
        )]));
        assert_eq!(job.plan_state().unwrap(), Some(ExecutionState::Queued));
    }
}
