//! Plugin wrapper
//!
//! Enforces the task ownership rules around a [`Backend`]:
//! - a plugin holds at most one task at a time
//! - tasks are only assigned after the backend accepted them
//! - a running task is never released
//! - backend failures during work turn the task Failed instead of escaping

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reel_core::domain::{ExecutionState, ExecutionTask, PluginStatus};
use reel_core::time::TimeProvider;
use reel_core::urn;
use tracing::{debug, error, warn};

use crate::backend::Backend;
use crate::capacity::workers::WorkerCountSource;
use crate::capacity::{CapacityPolicy, CapacityRegistry, Exclusive, SharedCapacity};
use crate::error::{PluginError, Result};

pub struct Plugin {
    urn: String,
    backend: Box<dyn Backend>,
    clock: Arc<dyn TimeProvider>,
    policy: Box<dyn CapacityPolicy>,
    current_task: Option<ExecutionTask>,
    occupied: Arc<AtomicBool>,
}

impl Plugin {
    /// Wrap `backend` as plugin instance `urn`
    ///
    /// The urn must have the shape `urn:<ns>:plugin:<type>:<instance>` where
    /// `<type>` is the backend's type.
    pub fn new(
        urn: impl Into<String>,
        backend: Box<dyn Backend>,
        clock: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        let urn = urn.into();
        if !urn::is_plugin_urn(&urn) {
            return Err(PluginError::InvalidUrn(urn));
        }
        if urn::plugin_type_from_urn(&urn) != Some(backend.plugin_type()) {
            return Err(PluginError::TypeMismatch {
                expected: backend.plugin_type().to_string(),
                urn,
            });
        }

        Ok(Self {
            urn,
            backend,
            clock,
            policy: Box::new(Exclusive),
            current_task: None,
            occupied: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Join the shared capacity pool of this plugin's type
    pub fn with_shared_capacity(
        mut self,
        registry: &Arc<CapacityRegistry>,
        workers: Arc<dyn WorkerCountSource>,
    ) -> Self {
        let plugin_type = self.backend.plugin_type().to_string();
        registry.register(&plugin_type, &self.urn, self.occupied.clone());
        self.policy = Box::new(SharedCapacity::new(registry.clone(), plugin_type, workers));
        self
    }

    pub fn urn(&self) -> &str {
        &self.urn
    }

    pub fn plugin_type(&self) -> &str {
        self.backend.plugin_type()
    }

    pub fn current_task(&self) -> Option<&ExecutionTask> {
        self.current_task.as_ref()
    }

    pub fn holds_task(&self) -> bool {
        self.current_task.is_some()
    }

    pub fn async_operation(&self) -> bool {
        self.backend.async_operation()
    }

    pub fn can_retry(&self) -> bool {
        self.backend.can_retry()
    }

    pub fn retry_max(&self) -> u32 {
        self.backend.retry_max()
    }

    pub fn can_cancel(&self) -> bool {
        self.backend.can_cancel()
    }

    pub fn can_pause(&self) -> bool {
        self.backend.can_pause()
    }

    /// Whether the plugin can take new work
    pub async fn busy(&self) -> bool {
        self.holds_task() || self.policy.busy(&self.urn).await
    }

    /// Validate `task` and write its estimation
    ///
    /// The task is left untouched when the backend rejects it.
    pub fn check_and_estimate(&self, task: &mut ExecutionTask) -> Result<bool> {
        self.check_task_urn(task)?;
        match self.backend.estimate(task) {
            Some(estimation) => {
                task.set_estimation(estimation);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Take ownership of a new task
    pub fn assign(&mut self, task: &mut ExecutionTask) -> Result<()> {
        self.ensure_idle()?;
        if !self.check_and_estimate(task)? {
            return Err(PluginError::Rejected {
                urn: self.urn.clone(),
                task: task.urn.clone(),
            });
        }
        task.start_time = Some(self.clock.now());
        self.hold(task);
        debug!(plugin = %self.urn, task = %task.urn, "Task assigned");
        Ok(())
    }

    /// Re-attach a task that was started before a leadership handover
    pub fn reassign(&mut self, task: &ExecutionTask) -> Result<()> {
        self.ensure_idle()?;
        self.check_task_urn(task)?;
        if task.start_time.is_none() {
            return Err(PluginError::NotStarted(task.urn.clone()));
        }
        self.hold(task);
        debug!(plugin = %self.urn, task = %task.urn, "Task reassigned");
        Ok(())
    }

    /// Give up the held task and stamp its end time
    ///
    /// Temporary input files of a Done task are removed on a best effort
    /// basis.
    pub async fn release(&mut self, task: &mut ExecutionTask) -> Result<()> {
        if let Some(current) = self.held_urn() {
            if current != task.urn {
                return Err(PluginError::UrnMismatch {
                    urn: self.urn.clone(),
                    task: task.urn.clone(),
                    expected: current,
                });
            }
            if task.state == ExecutionState::Running {
                return Err(PluginError::ReleaseWhileRunning(task.urn.clone()));
            }
            self.drop_task();
        }

        if task.state == ExecutionState::Done && task.from_is_temporary() {
            self.remove_temporary_essence(task).await;
        }
        task.end_time = Some(self.clock.now());
        Ok(())
    }

    /// Advance the task by one unit of backend work
    pub async fn pulse(&mut self, task: &mut ExecutionTask) -> Result<()> {
        match self.held_urn() {
            None => self.reassign(task)?,
            Some(current) if current != task.urn => {
                return Err(PluginError::UrnMismatch {
                    urn: self.urn.clone(),
                    task: task.urn.clone(),
                    expected: current,
                });
            }
            Some(_) => {}
        }

        let now = self.clock.now();
        if let Err(e) = self.backend.work(task, now).await {
            error!(plugin = %self.urn, task = %task.urn, "Task failed: {:#}", e);
            task.state = ExecutionState::Failed;
            return self.release(task).await;
        }

        self.hold(task);
        Ok(())
    }

    /// Restart a failed task
    ///
    /// Returns `false` once the retry budget is exhausted, leaving the task
    /// Failed. The foreign key is always cleared so the backend work is
    /// dispatched again. A granted retry takes the task back, so the
    /// instance stays occupied until the next pulse polls it.
    pub fn retry(&mut self, task: &mut ExecutionTask) -> Result<bool> {
        if !self.can_retry() {
            return Err(PluginError::unsupported(&self.urn, "retry"));
        }
        self.check_task_urn(task)?;
        if let Some(current) = self.held_urn().filter(|current| *current != task.urn) {
            return Err(PluginError::Busy {
                urn: self.urn.clone(),
                task: current,
            });
        }

        task.retries += 1;
        if task.retries > self.retry_max() {
            return Ok(false);
        }
        task.foreign_key = None;
        task.state = ExecutionState::Running;
        task.start_time = Some(self.clock.now());
        task.end_time = None;
        self.hold(task);
        warn!(plugin = %self.urn, task = %task.urn, "Retrying task, attempt {}", task.retries);
        Ok(true)
    }

    pub async fn cancel(&mut self, task: &mut ExecutionTask) -> Result<()> {
        if !self.can_cancel() {
            return Err(PluginError::unsupported(&self.urn, "cancel"));
        }
        self.check_task_urn(task)?;
        self.backend
            .cancel(task)
            .await
            .map_err(|e| PluginError::backend(&self.urn, e))?;
        task.state = ExecutionState::Canceled;
        Ok(())
    }

    pub async fn pause(&mut self, task: &mut ExecutionTask) -> Result<()> {
        if !self.can_pause() {
            return Err(PluginError::unsupported(&self.urn, "pause"));
        }
        self.check_task_urn(task)?;
        self.backend
            .pause(task)
            .await
            .map_err(|e| PluginError::backend(&self.urn, e))?;
        task.state = ExecutionState::Paused;
        Ok(())
    }

    /// Forget the held task without touching it
    pub fn reset(&mut self) {
        self.drop_task();
    }

    pub async fn status(&self) -> PluginStatus {
        PluginStatus {
            urn: self.urn.clone(),
            plugin_type: self.plugin_type().to_string(),
            busy: self.busy().await,
            current_task: self.current_task.clone(),
            estimated_completion: self
                .current_task
                .as_ref()
                .and_then(ExecutionTask::estimated_completion),
        }
    }

    fn check_task_urn(&self, task: &ExecutionTask) -> Result<()> {
        if task.plugin_urn != self.urn {
            return Err(PluginError::UrnMismatch {
                urn: self.urn.clone(),
                task: task.urn.clone(),
                expected: task.plugin_urn.clone(),
            });
        }
        Ok(())
    }

    fn held_urn(&self) -> Option<String> {
        self.current_task.as_ref().map(|t| t.urn.clone())
    }

    fn ensure_idle(&self) -> Result<()> {
        match &self.current_task {
            Some(current) => Err(PluginError::Busy {
                urn: self.urn.clone(),
                task: current.urn.clone(),
            }),
            None => Ok(()),
        }
    }

    fn hold(&mut self, task: &ExecutionTask) {
        self.current_task = Some(task.clone());
        self.occupied.store(true, Ordering::Release);
    }

    fn drop_task(&mut self) {
        self.current_task = None;
        self.occupied.store(false, Ordering::Release);
    }

    async fn remove_temporary_essence(&self, task: &ExecutionTask) {
        let dir = Path::new(&task.from.path);
        for file in &task.from.files {
            let path = dir.join(&file.value);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(plugin = %self.urn, task = %task.urn, "Unable to remove temporary file {}: {}", path.display(), e);
            }
        }

        match tokio::fs::read_dir(dir).await {
            Ok(mut entries) => match entries.next_entry().await {
                Ok(None) => {
                    if let Err(e) = tokio::fs::remove_dir(dir).await {
                        warn!(plugin = %self.urn, "Unable to remove temporary directory {}: {}", dir.display(), e);
                    }
                }
                Ok(Some(_)) => {}
                Err(e) => {
                    warn!(plugin = %self.urn, "Unable to list temporary directory {}: {}", dir.display(), e)
                }
            },
            Err(e) => {
                warn!(plugin = %self.urn, "Unable to open temporary directory {}: {}", dir.display(), e)
            }
        }
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("urn", &self.urn)
            .field("current_task", &self.current_task.as_ref().map(|t| &t.urn))
            .finish()
    }
}
