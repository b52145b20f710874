//! Core domain types
//!
//! This module contains the domain structures shared by the planner, the
//! executor, the plugins and the persistence layer. Everything here is plain
//! data plus the plan state machine; no I/O happens in this module.

pub mod command;
pub mod essence;
pub mod job;
pub mod plan;
pub mod semaphore;
pub mod status;
pub mod task;

pub use command::{Command, CommandKind};
pub use essence::{
    AspectRatio, Attachment, AttachmentKind, Essence, EssenceFile, EssenceFlags, FileKind,
    MediaFormat, Resolution,
};
pub use job::{Job, Priority};
pub use plan::ExecutionPlan;
pub use semaphore::Semaphore;
pub use status::{ExecutorStatus, PluginStatus};
pub use task::{ExecutionState, ExecutionTask};
