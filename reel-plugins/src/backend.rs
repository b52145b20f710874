//! Backend contract
//!
//! One implementation per integration. Backends only describe the work; the
//! [`Plugin`](crate::Plugin) wrapper owns the task lifecycle around them.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reel_core::domain::ExecutionTask;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Type segment used in plugin urns and planner routes
    fn plugin_type(&self) -> &str;

    /// Validate `task` and estimate its duration
    ///
    /// Must be pure: `None` rejects the task and nothing is written.
    fn estimate(&self, task: &ExecutionTask) -> Option<TimeDelta>;

    /// Advance the task by one unit of work
    ///
    /// Called on every pulse while the task is in flight, including for work
    /// that was already dispatched. Implementations talking to a remote
    /// service store its job id in `task.foreign_key` and re-poll it.
    async fn work(&self, task: &mut ExecutionTask, now: DateTime<Utc>) -> anyhow::Result<()>;

    /// Cancel dispatched work
    async fn cancel(&self, _task: &mut ExecutionTask) -> anyhow::Result<()> {
        anyhow::bail!("cancel is not supported by {}", self.plugin_type())
    }

    /// Pause dispatched work
    async fn pause(&self, _task: &mut ExecutionTask) -> anyhow::Result<()> {
        anyhow::bail!("pause is not supported by {}", self.plugin_type())
    }

    /// Whether work spans several pulses.
    ///
    /// Synchronous backends finish within one pulse and never occupy a slot.
    fn async_operation(&self) -> bool {
        true
    }

    fn can_retry(&self) -> bool {
        false
    }

    fn retry_max(&self) -> u32 {
        3
    }

    fn can_cancel(&self) -> bool {
        false
    }

    fn can_pause(&self) -> bool {
        false
    }
}
