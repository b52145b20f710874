//! Dummy backends
//!
//! Stand-ins that complete after a fixed duration of (possibly virtual) time.
//! They never touch the filesystem.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reel_core::domain::{EssenceFile, ExecutionState, ExecutionTask};

use crate::backend::Backend;

const OUTPUT_SUFFIXES: [&str; 3] = ["_1", "_2", "_3"];

/// Mark the task Running and report whether its estimated duration elapsed
fn elapsed(task: &mut ExecutionTask, now: DateTime<Utc>) -> bool {
    task.state = ExecutionState::Running;
    task.estimated_completion().is_some_and(|done| done <= now)
}

/// Carry the unchanged parts of the input over to the output
fn merge_from(task: &mut ExecutionTask) {
    let from = &task.from;
    let to = &mut task.to;
    if to.attachments.is_empty() {
        to.attachments = from.attachments.clone();
    }
    if to.path.is_empty() {
        to.path = from.path.clone();
    }
    to.flags |= from.flags;
}

/// Emit three numbered outputs named after the first input file
fn split_outputs(task: &mut ExecutionTask) {
    let first = task
        .from
        .files
        .first()
        .map(|f| f.value.clone())
        .unwrap_or_default();
    task.to.files = OUTPUT_SUFFIXES
        .iter()
        .map(|suffix| EssenceFile::filename(format!("{first}{suffix}")))
        .collect();
}

fn complete(task: &mut ExecutionTask, now: DateTime<Utc>) {
    task.end_time = Some(now);
    task.state = ExecutionState::Done;
}

/// Transcodes anything in 100 seconds
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyTranscoder;

impl DummyTranscoder {
    pub const PLUGIN_TYPE: &'static str = "dummy";
}

#[async_trait]
impl Backend for DummyTranscoder {
    fn plugin_type(&self) -> &str {
        Self::PLUGIN_TYPE
    }

    fn estimate(&self, task: &ExecutionTask) -> Option<TimeDelta> {
        task.to.files.is_empty().then(|| TimeDelta::seconds(100))
    }

    async fn work(&self, task: &mut ExecutionTask, now: DateTime<Utc>) -> anyhow::Result<()> {
        if elapsed(task, now) {
            split_outputs(task);
            merge_from(task);
            complete(task, now);
        }
        Ok(())
    }

    async fn cancel(&self, _task: &mut ExecutionTask) -> anyhow::Result<()> {
        Ok(())
    }

    fn can_cancel(&self) -> bool {
        true
    }
}

/// Preprocessor that applies flags without changing the format, in 10 seconds
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyLogo;

impl DummyLogo {
    pub const PLUGIN_TYPE: &'static str = "dummylogopp";
}

#[async_trait]
impl Backend for DummyLogo {
    fn plugin_type(&self) -> &str {
        Self::PLUGIN_TYPE
    }

    fn estimate(&self, task: &ExecutionTask) -> Option<TimeDelta> {
        (task.to.files.is_empty() && task.to.format == task.from.format)
            .then(|| TimeDelta::seconds(10))
    }

    async fn work(&self, task: &mut ExecutionTask, now: DateTime<Utc>) -> anyhow::Result<()> {
        if elapsed(task, now) {
            task.to.files = task.from.files.clone();
            merge_from(task);
            complete(task, now);
        }
        Ok(())
    }

    async fn cancel(&self, _task: &mut ExecutionTask) -> anyhow::Result<()> {
        Ok(())
    }

    fn can_cancel(&self) -> bool {
        true
    }
}

/// Transcoder that cannot apply flags, in 50 seconds
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyTimecode;

impl DummyTimecode {
    pub const PLUGIN_TYPE: &'static str = "dummytconly";
}

#[async_trait]
impl Backend for DummyTimecode {
    fn plugin_type(&self) -> &str {
        Self::PLUGIN_TYPE
    }

    fn estimate(&self, task: &ExecutionTask) -> Option<TimeDelta> {
        (task.to.files.is_empty() && task.to.flags == task.from.flags)
            .then(|| TimeDelta::seconds(50))
    }

    async fn work(&self, task: &mut ExecutionTask, now: DateTime<Utc>) -> anyhow::Result<()> {
        if elapsed(task, now) {
            split_outputs(task);
            merge_from(task);
            complete(task, now);
        }
        Ok(())
    }
}

/// Fails a configurable number of times before succeeding
///
/// The number of failures is read from the source custom format
/// `FailNumber.<n>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlakyDummy;

impl FlakyDummy {
    pub const PLUGIN_TYPE: &'static str = "dummyretry";
    const FAIL_PREFIX: &'static str = "FailNumber.";

    fn failures(task: &ExecutionTask) -> Option<u32> {
        task.from
            .custom_format
            .as_deref()?
            .strip_prefix(Self::FAIL_PREFIX)?
            .parse()
            .ok()
    }
}

#[async_trait]
impl Backend for FlakyDummy {
    fn plugin_type(&self) -> &str {
        Self::PLUGIN_TYPE
    }

    fn estimate(&self, task: &ExecutionTask) -> Option<TimeDelta> {
        Self::failures(task).map(|_| TimeDelta::seconds(15))
    }

    async fn work(&self, task: &mut ExecutionTask, now: DateTime<Utc>) -> anyhow::Result<()> {
        if !elapsed(task, now) {
            return Ok(());
        }
        let failures = Self::failures(task).unwrap_or_default();
        if task.retries < failures {
            anyhow::bail!("Simulated failure {} of {}", task.retries + 1, failures);
        }
        complete(task, now);
        Ok(())
    }

    fn can_retry(&self) -> bool {
        true
    }
}
