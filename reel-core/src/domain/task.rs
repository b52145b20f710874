//! Execution task domain types

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::essence::Essence;
use crate::urn;

/// Argument key marking an essence of the task as a disposable intermediate
pub const TEMPORARY_ESSENCE: &str = "temporary_essence";
/// Value of [`TEMPORARY_ESSENCE`] when the `from` essence is temporary
pub const TEMPORARY_FROM: &str = "from";
/// Argument key carrying the job display name to the backend
pub const NAME: &str = "name";

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionState {
    Queued,
    Running,
    Done,
    Failed,
    Canceled,
    Paused,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Queued => "queued",
            ExecutionState::Running => "running",
            ExecutionState::Done => "done",
            ExecutionState::Failed => "failed",
            ExecutionState::Canceled => "canceled",
            ExecutionState::Paused => "paused",
        }
    }

    /// Done, Failed and Canceled are final for a plan
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Done | ExecutionState::Failed | ExecutionState::Canceled
        )
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pipeline step, bound to exactly one plugin instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTask {
    pub id: Uuid,
    pub urn: String,
    pub plugin_urn: String,
    pub from: Essence,
    pub to: Essence,
    pub state: ExecutionState,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Estimated duration in milliseconds
    pub estimation_ms: i64,
    pub retries: u32,
    /// Backend's own id for dispatched work
    pub foreign_key: Option<String>,
    #[serde(default)]
    pub arguments: HashMap<String, String>,
}

impl ExecutionTask {
    /// Create a queued task for `plugin_urn` transforming `from` into `to`
    pub fn new(plugin_urn: impl Into<String>, from: Essence, to: Essence) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            urn: urn::new_urn("task", id),
            plugin_urn: plugin_urn.into(),
            from,
            to,
            state: ExecutionState::Queued,
            start_time: None,
            end_time: None,
            estimation_ms: 0,
            retries: 0,
            foreign_key: None,
            arguments: HashMap::new(),
        }
    }

    pub fn estimation(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.estimation_ms)
    }

    pub fn set_estimation(&mut self, estimation: TimeDelta) {
        self.estimation_ms = estimation.num_milliseconds();
    }

    /// Start time plus estimation, if the task has started
    pub fn estimated_completion(&self) -> Option<DateTime<Utc>> {
        self.start_time.map(|start| start + self.estimation())
    }

    /// Mark the `from` essence as a temporary intermediate
    pub fn mark_from_temporary(&mut self) {
        self.arguments
            .insert(TEMPORARY_ESSENCE.to_string(), TEMPORARY_FROM.to_string());
    }

    pub fn from_is_temporary(&self) -> bool {
        self.arguments
            .get(TEMPORARY_ESSENCE)
            .is_some_and(|v| v == TEMPORARY_FROM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_queued() {
        let task = ExecutionTask::new(
            "urn:reel:plugin:dummy:1",
            Essence::default(),
            Essence::default(),
        );
        assert_eq!(task.state, ExecutionState::Queued);
        assert!(urn::validate_urn(&task.urn, "task:"));
        assert!(task.estimated_completion().is_none());
        assert!(!task.from_is_temporary());
    }

    #[test]
    fn test_estimation_round_trip() {
        let mut task = ExecutionTask::new("p", Essence::default(), Essence::default());
        task.set_estimation(TimeDelta::seconds(100));
        assert_eq!(task.estimation_ms, 100_000);

        let start = Utc::now();
        task.start_time = Some(start);
        assert_eq!(
            task.estimated_completion(),
            Some(start + TimeDelta::seconds(100))
        );
    }

    #[test]
    fn test_temporary_marker() {
        let mut task = ExecutionTask::new("p", Essence::default(), Essence::default());
        task.mark_from_temporary();
        assert!(task.from_is_temporary());
    }
}
