//! Executor
//!
//! Drives the whole system forward one pulse at a time. Only the executor
//! holding the `executor` semaphore does any work; the others stand by and
//! take over once the lease expires.
//!
//! A pulse, as primary:
//! 1. drain pending commands
//! 2. run the planner, except right after taking leadership
//! 3. advance every active job through its current task

use std::collections::HashSet;
use std::sync::Arc;

use reel_core::domain::{
    Command, CommandKind, ExecutionPlan, ExecutionState, ExecutionTask, ExecutorStatus, Job,
};
use reel_core::time::TimeProvider;
use reel_plugins::{Plugin, PluginError};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::error::{EngineError, Result};
use super::planner::{Planner, PlannerConfig};
use crate::callback::{CallbackNotifier, notify_job};
use crate::repository::{CommandRepository, JobRepository, Repositories, SemaphoreRepository};

/// Id of the leader-election lease
pub const SEMAPHORE_ID: &str = "executor";

/// Step of the per-job state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Assign,
    Poll,
    Complete,
    Retry,
    Halt,
}

impl Transition {
    /// Where to pick up `task` at the start of a pulse
    fn resume(task: &ExecutionTask) -> Self {
        match task.state {
            ExecutionState::Queued if task.start_time.is_some() => Transition::Poll,
            ExecutionState::Queued => Transition::Assign,
            ExecutionState::Running => Transition::Poll,
            ExecutionState::Done => Transition::Complete,
            ExecutionState::Failed => Transition::Retry,
            ExecutionState::Canceled | ExecutionState::Paused => Transition::Halt,
        }
    }
}

struct ExecutorState {
    plugins: Vec<Plugin>,
    first_pulse: bool,
    was_primary: bool,
}

pub struct Executor {
    jobs: Arc<dyn JobRepository>,
    commands: Arc<dyn CommandRepository>,
    semaphores: Arc<dyn SemaphoreRepository>,
    callbacks: Arc<dyn CallbackNotifier>,
    clock: Arc<dyn TimeProvider>,
    planner: Planner,
    caller_id: String,
    state: Mutex<ExecutorState>,
}

impl Executor {
    /// Build an executor owning `plugins`
    ///
    /// `caller_id` identifies this instance in leader election, usually
    /// `<host>:<port>`.
    pub fn new(
        repositories: Repositories,
        callbacks: Arc<dyn CallbackNotifier>,
        clock: Arc<dyn TimeProvider>,
        plugins: Vec<Plugin>,
        planner: PlannerConfig,
        caller_id: impl Into<String>,
    ) -> Result<Self> {
        let mut urns = HashSet::new();
        for plugin in &plugins {
            if !urns.insert(plugin.urn()) {
                return Err(EngineError::Configuration(format!(
                    "plugin {} is registered more than once",
                    plugin.urn()
                )));
            }
        }

        let planner = Planner::new(repositories.jobs.clone(), callbacks.clone(), clock.clone(), planner);
        Ok(Self {
            jobs: repositories.jobs,
            commands: repositories.commands,
            semaphores: repositories.semaphores,
            callbacks,
            clock,
            planner,
            caller_id: caller_id.into(),
            state: Mutex::new(ExecutorState {
                plugins,
                first_pulse: true,
                was_primary: false,
            }),
        })
    }

    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }

    pub async fn pulse(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        if !self.semaphores.acquire(SEMAPHORE_ID, &self.caller_id).await? {
            if state.first_pulse {
                info!("Executor {} started as standby", self.caller_id);
            } else if state.was_primary {
                warn!("Executor {} lost leadership", self.caller_id);
            }
            state.first_pulse = false;
            state.was_primary = false;
            return Ok(());
        }

        let took_over = state.first_pulse || !state.was_primary;
        if took_over {
            info!("Executor {} is now primary", self.caller_id);
            for plugin in state.plugins.iter_mut() {
                plugin.reset();
            }
        }
        state.first_pulse = false;
        state.was_primary = true;

        self.process_commands(&mut state.plugins).await?;
        if !took_over {
            self.planner.calculate(&state.plugins).await?;
        }
        self.advance_jobs(&mut state.plugins).await
    }

    pub async fn status(&self) -> ExecutorStatus {
        let state = self.state.lock().await;
        let mut plugins = Vec::with_capacity(state.plugins.len());
        for plugin in &state.plugins {
            plugins.push(plugin.status().await);
        }
        ExecutorStatus {
            plugins,
            timestamp: self.clock.now(),
            is_primary: state.was_primary,
        }
    }

    pub async fn is_primary(&self) -> bool {
        self.state.lock().await.was_primary
    }

    /// Give up leadership so a standby can take over without waiting
    pub async fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if self.semaphores.release(SEMAPHORE_ID, &self.caller_id).await? {
            info!("Executor {} released leadership", self.caller_id);
        }
        state.was_primary = false;
        Ok(())
    }

    async fn process_commands(&self, plugins: &mut [Plugin]) -> Result<()> {
        for command in self.commands.all().await? {
            let result = match command.kind {
                CommandKind::Cancel => self.cancel_job(plugins, &command).await,
                other => {
                    warn!(job = %command.urn, "Unsupported command {} from {}", other.as_str(), command.username);
                    Ok(())
                }
            };
            self.commands.remove(&command).await?;
            result?;
        }
        Ok(())
    }

    async fn cancel_job(&self, plugins: &mut [Plugin], command: &Command) -> Result<()> {
        let Some(mut job) = self.jobs.get(&command.urn).await? else {
            warn!(job = %command.urn, "Unable to cancel unknown job");
            return Ok(());
        };

        match job.plan.as_mut() {
            None => job.plan = Some(ExecutionPlan::canceled()),
            Some(plan) => {
                let state = plan.state()?;
                let task = match plan.current_task()? {
                    Some(task) if !state.is_terminal() => task,
                    _ => {
                        warn!(job = %job.urn, "Unable to cancel job. Job state was {}", state);
                        return Ok(());
                    }
                };

                if task.state == ExecutionState::Queued && task.start_time.is_none() {
                    task.state = ExecutionState::Canceled;
                } else {
                    let Some(plugin) = plugins.iter_mut().find(|p| p.urn() == task.plugin_urn) else {
                        warn!(job = %job.urn, plugin = %task.plugin_urn, "Unable to cancel job. Plugin is not registered");
                        return Ok(());
                    };
                    if !plugin.can_cancel() {
                        warn!(job = %job.urn, plugin = %plugin.urn(), "Unable to cancel job. Plugin does not support cancel");
                        return Ok(());
                    }
                    match plugin.cancel(task).await {
                        Ok(()) => {}
                        Err(e @ PluginError::Backend { .. }) => {
                            warn!(job = %job.urn, plugin = %plugin.urn(), "Unable to cancel job: {:#}", e);
                            return Ok(());
                        }
                        Err(e) => return Err(e.into()),
                    }
                    plugin.release(task).await?;
                }
            }
        }

        job.end_time = Some(self.clock.now());
        let job = self.jobs.update(&job).await?;
        info!(job = %job.urn, "Job canceled by {}", command.username);
        notify_job(self.callbacks.as_ref(), &job).await;
        Ok(())
    }

    async fn advance_jobs(&self, plugins: &mut [Plugin]) -> Result<()> {
        for job in self.jobs.active_jobs().await? {
            self.advance_job(plugins, job).await?;
        }
        Ok(())
    }

    /// Run the job's current task as far as this pulse allows
    ///
    /// A retried task is left Running and polled again on the next pulse.
    async fn advance_job(&self, plugins: &mut [Plugin], mut job: Job) -> Result<()> {
        let Some(tasks) = job.plan.as_ref().map(|plan| plan.tasks.len()) else {
            return Ok(());
        };

        let mut next: Option<Transition> = None;
        for _ in 0..(3 * tasks + 1) {
            let Some(plan) = job.plan.as_mut() else {
                break;
            };
            let Some(index) = plan.current_index()? else {
                break;
            };
            let task = &mut plan.tasks[index];
            let Some(plugin) = plugins.iter_mut().find(|p| p.urn() == task.plugin_urn) else {
                error!(job = %job.urn, plugin = %task.plugin_urn, "Plugin is not registered, skipping job");
                return Ok(());
            };

            let step = next.take().unwrap_or_else(|| Transition::resume(task));
            debug!(job = %job.urn, task = %task.urn, "{:?}", step);
            next = match step {
                Transition::Assign => {
                    if plugin.busy().await {
                        Some(Transition::Halt)
                    } else {
                        plugin.assign(task)?;
                        Some(Transition::Poll)
                    }
                }
                Transition::Poll => {
                    plugin.pulse(task).await?;
                    match task.state {
                        ExecutionState::Done => Some(Transition::Complete),
                        ExecutionState::Failed => Some(Transition::Retry),
                        _ => Some(Transition::Halt),
                    }
                }
                Transition::Complete => {
                    plugin.release(task).await?;
                    plan.move_to_next_task()?;
                    if plan.current_index()?.is_some() {
                        job = self.jobs.update(&job).await?;
                        None
                    } else {
                        Some(Transition::Halt)
                    }
                }
                Transition::Retry => {
                    if !(plugin.can_retry() && task.retries < plugin.retry_max() && plugin.retry(task)?) {
                        plugin.release(task).await?;
                    }
                    Some(Transition::Halt)
                }
                Transition::Halt => Some(Transition::Halt),
            };
            if next == Some(Transition::Halt) {
                break;
            }
        }

        self.finish(job).await
    }

    /// Persist the job and report terminal outcomes
    async fn finish(&self, mut job: Job) -> Result<()> {
        let state = job.plan_state()?;
        match state {
            Some(ExecutionState::Done) => {
                let destination = match job.plan.as_ref() {
                    Some(plan) => plan.current_essence()?.cloned(),
                    None => None,
                };
                if let Some(destination) = destination {
                    job.destination = destination;
                }
                job.end_time = Some(self.clock.now());
                info!(job = %job.urn, "Job done");
            }
            Some(ExecutionState::Failed) => {
                job.end_time = Some(self.clock.now());
                warn!(job = %job.urn, "Job failed");
            }
            _ => {}
        }

        let job = self.jobs.update(&job).await?;
        if matches!(state, Some(ExecutionState::Done | ExecutionState::Failed)) {
            notify_job(self.callbacks.as_ref(), &job).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::planner::Route;
    use crate::testing::{RecordingNotifier, plugin};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, Utc};
    use reel_core::domain::{
        Attachment, AttachmentKind, Essence, EssenceFile, EssenceFlags, MediaFormat,
    };
    use reel_core::time::VirtualClock;
    use reel_plugins::Backend;
    use reel_plugins::backends::{DummyLogo, DummyTimecode, DummyTranscoder, FlakyDummy};

    const CALLBACK: &str = "http://localhost/callback";

    /// Fails every time it is asked to work
    struct Crashing;

    #[async_trait]
    impl Backend for Crashing {
        fn plugin_type(&self) -> &str {
            "crashing"
        }

        fn estimate(&self, _task: &ExecutionTask) -> Option<TimeDelta> {
            Some(TimeDelta::seconds(30))
        }

        async fn work(&self, _task: &mut ExecutionTask, _now: DateTime<Utc>) -> anyhow::Result<()> {
            anyhow::bail!("encoder exited with status 1")
        }

        fn can_retry(&self) -> bool {
            true
        }
    }

    struct Fixture {
        clock: Arc<VirtualClock>,
        repos: Repositories,
        callbacks: Arc<RecordingNotifier>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(VirtualClock::new(chrono::Utc::now()));
        let repos = Repositories::in_memory(clock.clone(), TimeDelta::seconds(60));
        Fixture {
            clock,
            repos,
            callbacks: Arc::new(RecordingNotifier::default()),
        }
    }

    fn dummy_config() -> PlannerConfig {
        PlannerConfig {
            routes: vec![
                Route::new(DummyTranscoder::PLUGIN_TYPE, [MediaFormat::H264OdStandard]),
                Route::new(FlakyDummy::PLUGIN_TYPE, [MediaFormat::Custom]),
                Route::new(DummyTimecode::PLUGIN_TYPE, [MediaFormat::Avc1]),
            ],
            preprocessor_type: DummyLogo::PLUGIN_TYPE.to_string(),
            hard_subtitles_format: MediaFormat::Xd5c,
            ..Default::default()
        }
    }

    impl Fixture {
        fn executor(&self, caller_id: &str) -> Executor {
            let plugins = vec![
                plugin(&self.clock, Box::new(DummyLogo), 1),
                plugin(&self.clock, Box::new(DummyTranscoder), 1),
                plugin(&self.clock, Box::new(FlakyDummy), 1),
                plugin(&self.clock, Box::new(DummyTimecode), 1),
            ];
            self.executor_with(caller_id, plugins)
        }

        fn executor_with(&self, caller_id: &str, plugins: Vec<Plugin>) -> Executor {
            Executor::new(
                self.repos.clone(),
                self.callbacks.clone(),
                self.clock.clone(),
                plugins,
                dummy_config(),
                caller_id,
            )
            .unwrap()
        }

        fn source(&self) -> Essence {
            Essence {
                path: "/media/in".to_string(),
                files: vec![EssenceFile::filename("clip.mxf")],
                format: MediaFormat::Xd5c,
                duration_ms: 60_000,
                ..Default::default()
            }
        }

        async fn order(&self, destination: Essence, source: Essence) -> Job {
            let mut job = Job::new("clip", source, destination, self.clock.now());
            job.callback_url = Some(CALLBACK.to_string());
            self.repos.jobs.add(job).await.unwrap()
        }

        async fn get(&self, job: &Job) -> Job {
            self.repos.jobs.get(&job.urn).await.unwrap().unwrap()
        }

        async fn state(&self, job: &Job) -> Option<ExecutionState> {
            self.get(job).await.plan_state().unwrap()
        }

        async fn step(&self, executor: &Executor, seconds: i64) {
            self.clock.step(TimeDelta::seconds(seconds)).unwrap();
            executor.pulse().await.unwrap();
        }

        fn holding(&self, status: &ExecutorStatus, urn: &str) -> Option<String> {
            status
                .plugins
                .iter()
                .find(|p| p.urn == urn)
                .and_then(|p| p.current_task.as_ref())
                .map(|t| t.urn.clone())
        }

        async fn cancel(&self, job: &Job) {
            self.repos
                .commands
                .add(Command::cancel(&job.urn, "alice"))
                .await
                .unwrap();
        }
    }

    fn transcode_to(format: MediaFormat) -> Essence {
        Essence {
            path: "/media/out".to_string(),
            format,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_hard_subtitles_and_logo_job_completes() {
        let fx = fixture();
        let executor = fx.executor("node-a:8080");

        let mut source = fx.source();
        source.attachments = vec![
            Attachment::new(AttachmentKind::Subtitle, "/media/in/clip.vtt"),
            Attachment::new(AttachmentKind::Logo, "/media/in/logo.png"),
        ];
        let mut destination = transcode_to(MediaFormat::H264OdStandard);
        destination.flags = EssenceFlags::HARD_SUBTITLES | EssenceFlags::LOGO;
        let job = fx.order(destination, source).await;

        let mut observed = vec![fx.state(&job).await];
        executor.pulse().await.unwrap();
        for _ in 0..60 {
            fx.step(&executor, 5).await;
            let state = fx.state(&job).await;
            if observed.last() != Some(&state) {
                observed.push(state);
            }
        }

        assert_eq!(
            observed,
            vec![
                None,
                Some(ExecutionState::Running),
                Some(ExecutionState::Done)
            ]
        );
        let done = fx.get(&job).await;
        let plan = done.plan.as_ref().unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[0].plugin_urn, "urn:reel:plugin:dummylogopp:1");
        assert_eq!(plan.tasks[1].plugin_urn, "urn:reel:plugin:dummy:1");
        assert!(
            done.destination
                .flags
                .contains(EssenceFlags::HARD_SUBTITLES | EssenceFlags::LOGO)
        );
        assert_eq!(done.destination.files.len(), 3);
        assert!(done.end_time.is_some());
        assert_eq!(fx.callbacks.calls(), vec![job.urn.clone()]);
        assert!(fx.repos.jobs.active_jobs().await.unwrap().is_empty());
        assert_eq!(fx.repos.jobs.done_jobs(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_first_pulse_skips_planning() {
        let fx = fixture();
        let executor = fx.executor("node-a:8080");
        let job = fx
            .order(transcode_to(MediaFormat::H264OdStandard), fx.source())
            .await;

        executor.pulse().await.unwrap();
        assert!(executor.is_primary().await);
        assert!(fx.get(&job).await.is_waiting());

        executor.pulse().await.unwrap();
        let running = fx.get(&job).await;
        assert_eq!(running.plan_state().unwrap(), Some(ExecutionState::Running));
        assert!(running.plan.unwrap().tasks[0].start_time.is_some());
    }

    #[rstest::rstest]
    #[case("FailNumber.2", ExecutionState::Done, 2)]
    #[case("FailNumber.4", ExecutionState::Failed, 3)]
    #[tokio::test]
    async fn test_retry_budget(#[case] custom: &str, #[case] outcome: ExecutionState, #[case] retries: u32) {
        let fx = fixture();
        let executor = fx.executor("node-a:8080");
        let mut source = fx.source();
        source.custom_format = Some(custom.to_string());
        let job = fx.order(transcode_to(MediaFormat::Custom), source).await;

        executor.pulse().await.unwrap();
        for _ in 0..40 {
            fx.step(&executor, 5).await;
        }

        let finished = fx.get(&job).await;
        assert_eq!(finished.plan_state().unwrap(), Some(outcome));
        assert_eq!(finished.plan.unwrap().tasks[0].retries, retries);
        assert_eq!(fx.callbacks.calls(), vec![job.urn]);
    }

    #[tokio::test]
    async fn test_instant_failures_use_whole_retry_budget() {
        let fx = fixture();
        let executor = fx.executor_with("node-a:8080", vec![plugin(&fx.clock, Box::new(Crashing), 1)]);
        let job = fx.order(transcode_to(MediaFormat::Custom), fx.source()).await;
        let mut planned = fx.get(&job).await;
        planned.plan = Some(ExecutionPlan::new(vec![ExecutionTask::new(
            "urn:reel:plugin:crashing:1",
            fx.source(),
            transcode_to(MediaFormat::Custom),
        )]));
        fx.repos.jobs.update(&planned).await.unwrap();

        for attempt in 1..=3 {
            executor.pulse().await.unwrap();
            let stored = fx.get(&job).await;
            assert_eq!(stored.plan_state().unwrap(), Some(ExecutionState::Running));
            assert_eq!(stored.plan.unwrap().tasks[0].retries, attempt);
            assert!(stored.end_time.is_none());
            assert!(fx.callbacks.calls().is_empty());
        }

        executor.pulse().await.unwrap();
        let failed = fx.get(&job).await;
        assert_eq!(failed.plan_state().unwrap(), Some(ExecutionState::Failed));
        assert_eq!(failed.plan.unwrap().tasks[0].retries, 3);
        assert!(failed.end_time.is_some());
        assert_eq!(fx.callbacks.calls(), vec![job.urn.clone()]);

        executor.pulse().await.unwrap();
        executor.pulse().await.unwrap();
        assert_eq!(fx.callbacks.calls().len(), 1);
        assert!(!executor.status().await.plugins[0].busy);
    }

    #[tokio::test]
    async fn test_cancel_waiting_job() {
        let fx = fixture();
        let executor = fx.executor("node-a:8080");
        let job = fx
            .order(transcode_to(MediaFormat::H264OdStandard), fx.source())
            .await;

        fx.cancel(&job).await;
        executor.pulse().await.unwrap();

        assert_eq!(fx.state(&job).await, Some(ExecutionState::Canceled));
        assert!(fx.repos.commands.all().await.unwrap().is_empty());
        assert_eq!(fx.callbacks.calls(), vec![job.urn]);
    }

    #[tokio::test]
    async fn test_cancel_queued_job() {
        let fx = fixture();
        let executor = fx.executor("node-a:8080");
        let first = fx.order(transcode_to(MediaFormat::Avc1), fx.source()).await;
        executor.pulse().await.unwrap();
        fx.step(&executor, 5).await;
        assert_eq!(fx.state(&first).await, Some(ExecutionState::Running));

        // Bound to the instance the first job holds, so it cannot start
        let second = fx.order(transcode_to(MediaFormat::Avc1), fx.source()).await;
        let mut planned = fx.get(&second).await;
        planned.plan = Some(ExecutionPlan::new(vec![ExecutionTask::new(
            "urn:reel:plugin:dummytconly:1",
            fx.source(),
            transcode_to(MediaFormat::Avc1),
        )]));
        fx.repos.jobs.update(&planned).await.unwrap();
        fx.step(&executor, 5).await;
        assert_eq!(fx.state(&second).await, Some(ExecutionState::Queued));

        fx.cancel(&second).await;
        fx.step(&executor, 5).await;
        let canceled = fx.get(&second).await;
        assert_eq!(canceled.plan_state().unwrap(), Some(ExecutionState::Canceled));
        assert!(canceled.plan.unwrap().tasks[0].start_time.is_none());
        assert_eq!(fx.state(&first).await, Some(ExecutionState::Running));
    }

    #[tokio::test]
    async fn test_cancel_running_job_releases_plugin() {
        let fx = fixture();
        let executor = fx.executor("node-a:8080");
        let job = fx
            .order(transcode_to(MediaFormat::H264OdStandard), fx.source())
            .await;

        executor.pulse().await.unwrap();
        fx.step(&executor, 5).await;
        assert_eq!(fx.state(&job).await, Some(ExecutionState::Running));

        fx.cancel(&job).await;
        fx.step(&executor, 5).await;

        let canceled = fx.get(&job).await;
        assert_eq!(canceled.plan_state().unwrap(), Some(ExecutionState::Canceled));
        assert!(canceled.end_time.is_some());
        let status = executor.status().await;
        let transcoder = status
            .plugins
            .iter()
            .find(|p| p.urn == "urn:reel:plugin:dummy:1")
            .unwrap();
        assert!(!transcoder.busy);
    }

    #[tokio::test]
    async fn test_cancel_done_job_only_warns() {
        let fx = fixture();
        let executor = fx.executor("node-a:8080");
        let job = fx
            .order(transcode_to(MediaFormat::H264OdStandard), fx.source())
            .await;

        executor.pulse().await.unwrap();
        for _ in 0..25 {
            fx.step(&executor, 5).await;
        }
        let done = fx.get(&job).await;
        assert_eq!(done.plan_state().unwrap(), Some(ExecutionState::Done));

        fx.cancel(&job).await;
        fx.step(&executor, 5).await;
        let after = fx.get(&job).await;
        assert_eq!(after.plan_state().unwrap(), Some(ExecutionState::Done));
        assert_eq!(after.last_modified, done.last_modified);
        assert!(fx.repos.commands.all().await.unwrap().is_empty());
        assert_eq!(fx.callbacks.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_standby_takes_over_after_lease_expires() {
        let fx = fixture();
        let primary = fx.executor("node-a:8080");
        let standby = fx.executor("node-b:8080");
        let job = fx
            .order(transcode_to(MediaFormat::H264OdStandard), fx.source())
            .await;

        primary.pulse().await.unwrap();
        standby.pulse().await.unwrap();
        primary.pulse().await.unwrap();
        assert!(primary.is_primary().await);
        assert!(!standby.is_primary().await);
        assert_eq!(fx.state(&job).await, Some(ExecutionState::Running));

        // primary stops pulsing; its lease expires
        fx.clock.step(TimeDelta::seconds(61)).unwrap();
        standby.pulse().await.unwrap();
        assert!(standby.is_primary().await);
        let status = standby.status().await;
        let transcoder = status
            .plugins
            .iter()
            .find(|p| p.urn == "urn:reel:plugin:dummy:1")
            .unwrap();
        let task_urn = fx.get(&job).await.plan.unwrap().tasks[0].urn.clone();
        assert_eq!(
            transcoder.current_task.as_ref().map(|t| t.urn.as_str()),
            Some(task_urn.as_str())
        );

        primary.pulse().await.unwrap();
        assert!(!primary.is_primary().await);

        for _ in 0..10 {
            fx.step(&standby, 5).await;
        }
        assert_eq!(fx.state(&job).await, Some(ExecutionState::Done));
    }

    #[tokio::test]
    async fn test_regained_leadership_resets_plugins() {
        let fx = fixture();
        let node_a = fx.executor("node-a:8080");
        let node_b = fx.executor("node-b:8080");
        let first = fx
            .order(transcode_to(MediaFormat::H264OdStandard), fx.source())
            .await;

        node_a.pulse().await.unwrap();
        fx.step(&node_a, 5).await;
        let task_urn = fx.get(&first).await.plan.unwrap().tasks[0].urn.clone();
        assert_eq!(
            fx.holding(&node_a.status().await, "urn:reel:plugin:dummy:1"),
            Some(task_urn.clone())
        );

        // node-a stalls, node-b takes over and finishes the job
        fx.clock.step(TimeDelta::seconds(61)).unwrap();
        node_b.pulse().await.unwrap();
        assert!(node_b.is_primary().await);
        for _ in 0..30 {
            fx.step(&node_b, 5).await;
        }
        assert_eq!(fx.state(&first).await, Some(ExecutionState::Done));

        node_a.pulse().await.unwrap();
        assert!(!node_a.is_primary().await);
        assert_eq!(
            fx.holding(&node_a.status().await, "urn:reel:plugin:dummy:1"),
            Some(task_urn)
        );

        // node-b stalls in turn and node-a gets the lease back
        let second = fx
            .order(transcode_to(MediaFormat::H264OdStandard), fx.source())
            .await;
        fx.clock.step(TimeDelta::seconds(61)).unwrap();
        node_a.pulse().await.unwrap();
        assert!(node_a.is_primary().await);
        let status = node_a.status().await;
        assert!(status.plugins.iter().all(|p| p.current_task.is_none()));
        assert!(fx.get(&second).await.is_waiting());

        fx.step(&node_a, 5).await;
        let running = fx.get(&second).await;
        assert_eq!(running.plan_state().unwrap(), Some(ExecutionState::Running));
        assert_eq!(running.plan.unwrap().tasks[0].plugin_urn, "urn:reel:plugin:dummy:1");
    }

    #[tokio::test]
    async fn test_shutdown_hands_over_immediately() {
        let fx = fixture();
        let primary = fx.executor("node-a:8080");
        let standby = fx.executor("node-b:8080");

        primary.pulse().await.unwrap();
        primary.shutdown().await.unwrap();
        standby.pulse().await.unwrap();
        assert!(standby.is_primary().await);
    }

    #[tokio::test]
    async fn test_duplicate_plugin_urns_rejected() {
        let fx = fixture();
        let plugins = vec![
            plugin(&fx.clock, Box::new(DummyTranscoder), 1),
            plugin(&fx.clock, Box::new(DummyTranscoder), 1),
        ];
        let result = Executor::new(
            fx.repos.clone(),
            fx.callbacks.clone(),
            fx.clock.clone(),
            plugins,
            dummy_config(),
            "node-a:8080",
        );
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }
}
