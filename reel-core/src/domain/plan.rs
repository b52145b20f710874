//! Execution plan state machine
//!
//! A plan is the ordered list of tasks that turns a job's source essence into
//! its destination. The aggregate state is never stored; it is derived from
//! the task states and the active index every time it is asked for.
//!
//! An empty task list is how a canceled plan is represented.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::essence::Essence;
use super::task::{ExecutionState, ExecutionTask};
use crate::error::{Error, Result};
use crate::urn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub urn: String,
    pub tasks: Vec<ExecutionTask>,
    /// Unset before the first task starts and after the last one completes
    pub active_task_index: Option<usize>,
}

impl ExecutionPlan {
    pub fn new(tasks: Vec<ExecutionTask>) -> Self {
        Self {
            urn: urn::new_urn("plan", Uuid::new_v4()),
            tasks,
            active_task_index: None,
        }
    }

    /// A plan with no tasks, which reads as Canceled
    pub fn canceled() -> Self {
        Self::new(Vec::new())
    }

    /// Aggregate state of the plan
    pub fn state(&self) -> Result<ExecutionState> {
        if self.tasks.is_empty() {
            return Ok(ExecutionState::Canceled);
        }

        let any = |state: ExecutionState| self.tasks.iter().any(|t| t.state == state);
        let all = |state: ExecutionState| self.tasks.iter().all(|t| t.state == state);

        if any(ExecutionState::Failed) {
            Ok(ExecutionState::Failed)
        } else if any(ExecutionState::Canceled) {
            Ok(ExecutionState::Canceled)
        } else if all(ExecutionState::Queued) {
            Ok(ExecutionState::Queued)
        } else if all(ExecutionState::Done) && self.active_task_index.is_none() {
            Ok(ExecutionState::Done)
        } else if any(ExecutionState::Running) || self.active_task_index.is_some() {
            Ok(ExecutionState::Running)
        } else {
            Err(Error::PlanInconsistent(self.urn.clone()))
        }
    }

    /// Index of the task currently being worked on
    ///
    /// Moves onto the first task when the plan has not started yet.
    /// Returns `None` once the plan is Done or Canceled.
    pub fn current_index(&mut self) -> Result<Option<usize>> {
        if matches!(
            self.state()?,
            ExecutionState::Done | ExecutionState::Canceled
        ) {
            return Ok(None);
        }
        if self.active_task_index.is_none() {
            self.move_to_next_task()?;
        }
        match self.state()? {
            ExecutionState::Done | ExecutionState::Canceled => Ok(None),
            _ => Ok(self.active_task_index),
        }
    }

    /// Task currently being worked on, see [`ExecutionPlan::current_index`]
    pub fn current_task(&mut self) -> Result<Option<&mut ExecutionTask>> {
        Ok(self.current_index()?.map(|i| &mut self.tasks[i]))
    }

    /// Advance past the current task if it is Done
    ///
    /// The output essence of the finished task becomes the input of the next
    /// one, since output file names are only known after a step completes.
    pub fn move_to_next_task(&mut self) -> Result<()> {
        if self.state()? == ExecutionState::Done {
            return Err(Error::PlanAlreadyComplete(self.urn.clone()));
        }

        match self.active_task_index {
            None => {
                if !self.tasks.is_empty() {
                    self.active_task_index = Some(0);
                }
            }
            Some(index) if self.tasks[index].state == ExecutionState::Done => {
                let next = index + 1;
                if next == self.tasks.len() {
                    self.active_task_index = None;
                } else {
                    self.tasks[next].from = self.tasks[index].to.clone();
                    self.active_task_index = Some(next);
                }
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Output of the last completed step, or the plan input if nothing ran yet
    pub fn current_essence(&self) -> Result<Option<&Essence>> {
        let essence = match self.active_task_index {
            None if self.state()? == ExecutionState::Done => self.tasks.last().map(|t| &t.to),
            None => self.tasks.first().map(|t| &t.from),
            Some(0) => self.tasks.first().map(|t| &t.from),
            Some(index) => self.tasks.get(index - 1).map(|t| &t.to),
        };
        Ok(essence)
    }

    /// Total estimated duration of all tasks
    pub fn total_estimation(&self) -> chrono::TimeDelta {
        self.tasks
            .iter()
            .fold(chrono::TimeDelta::zero(), |acc, t| acc + t.estimation())
    }
}
