//! Shared fixtures for engine and API tests

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use reel_core::domain::{Essence, EssenceFile, ExecutionState, ExecutionTask, Job, MediaFormat, Priority};
use reel_core::time::{TimeProvider, VirtualClock};
use reel_core::urn;
use reel_plugins::{Backend, Plugin};

use crate::callback::CallbackNotifier;

/// Records the urn of every job it is notified about
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    calls: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CallbackNotifier for RecordingNotifier {
    async fn notify(&self, job: &Job) -> anyhow::Result<()> {
        self.calls.lock().push(job.urn.clone());
        Ok(())
    }
}

/// Backend of any type that accepts everything and never finishes
pub(crate) struct Stub {
    plugin_type: &'static str,
    accept: bool,
}

impl Stub {
    pub(crate) fn new(plugin_type: &'static str) -> Self {
        Self {
            plugin_type,
            accept: true,
        }
    }

    pub(crate) fn rejecting(mut self) -> Self {
        self.accept = false;
        self
    }
}

#[async_trait]
impl Backend for Stub {
    fn plugin_type(&self) -> &str {
        self.plugin_type
    }

    fn estimate(&self, _task: &ExecutionTask) -> Option<TimeDelta> {
        self.accept.then(|| TimeDelta::seconds(60))
    }

    async fn work(&self, task: &mut ExecutionTask, _now: DateTime<Utc>) -> anyhow::Result<()> {
        task.state = ExecutionState::Running;
        Ok(())
    }
}

pub(crate) fn plugin(clock: &Arc<VirtualClock>, backend: Box<dyn Backend>, instance: usize) -> Plugin {
    let urn = urn::plugin_urn(backend.plugin_type(), &instance.to_string());
    Plugin::new(urn, backend, clock.clone()).unwrap()
}

/// Waiting job transcoding an xd5c clip into `format`
pub(crate) fn job(clock: &VirtualClock, format: MediaFormat, priority: Priority, duration_ms: u64) -> Job {
    let source = Essence {
        path: "/media/in".to_string(),
        files: vec![EssenceFile::filename("clip.mxf")],
        format: MediaFormat::Xd5c,
        duration_ms,
        ..Default::default()
    };
    let destination = Essence {
        path: "/media/out".to_string(),
        format,
        duration_ms,
        ..Default::default()
    };
    let mut job = Job::new("clip", source, destination, clock.now());
    job.priority = priority;
    job
}
