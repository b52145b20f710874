//! Planner
//!
//! Turns waiting jobs into execution plans. Jobs are visited by priority,
//! then due date. A job is either placed onto free plugin instances, left
//! waiting for capacity, or canceled when nothing registered can serve it.
//!
//! Pipeline of a plan:
//! 1. hard subtitles preprocessing, when requested
//! 2. alternate audio muxing, when requested
//! 3. transcoding on the route's plugin type
//! 4. renaming, when the destination names its files

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use chrono::TimeDelta;
use reel_core::domain::task::NAME;
use reel_core::domain::{
    AttachmentKind, Essence, EssenceFlags, ExecutionPlan, ExecutionState, ExecutionTask, Job,
    MediaFormat, Priority,
};
use reel_core::time::TimeProvider;
use reel_core::urn;
use reel_plugins::Plugin;
use tracing::{debug, info, warn};

use super::error::{EngineError, Result};
use crate::callback::{CallbackNotifier, notify_job};
use crate::repository::JobRepository;

/// Destination formats served by one plugin type
#[derive(Debug, Clone)]
pub struct Route {
    pub plugin_type: String,
    pub formats: Vec<MediaFormat>,
    /// Keep the last free instance for high priority or short jobs
    pub reserve_last_instance: bool,
}

impl Route {
    pub fn new(plugin_type: impl Into<String>, formats: impl Into<Vec<MediaFormat>>) -> Self {
        Self {
            plugin_type: plugin_type.into(),
            formats: formats.into(),
            reserve_last_instance: true,
        }
    }

    pub fn without_reservation(mut self) -> Self {
        self.reserve_last_instance = false;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Checked in order, the first route serving the destination format wins
    pub routes: Vec<Route>,
    pub preprocessor_type: String,
    /// Format produced by burning in subtitles
    pub hard_subtitles_format: MediaFormat,
    pub renamer_type: String,
    /// Jobs longer than this may not take the last free instance
    pub long_duration: TimeDelta,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            routes: vec![
                Route::new(
                    "wfs",
                    [
                        MediaFormat::H264OdSingle,
                        MediaFormat::H264OdStandard,
                        MediaFormat::H264OdDropfolder,
                        MediaFormat::H264OdPodcast,
                    ],
                ),
                Route::new("ffmpeg", [MediaFormat::AudioOdStandard]).without_reservation(),
            ],
            preprocessor_type: "ffmpeg".to_string(),
            hard_subtitles_format: MediaFormat::Xd5c,
            renamer_type: "filerenamer".to_string(),
            long_duration: TimeDelta::minutes(5),
        }
    }
}

impl PlannerConfig {
    pub fn route_for(&self, format: MediaFormat) -> Option<&Route> {
        self.routes.iter().find(|route| route.formats.contains(&format))
    }
}

/// Optional step run on the preprocessor before transcoding
struct Preprocess {
    flag: EssenceFlags,
    attachment: AttachmentKind,
    label: &'static str,
    /// Output format, the job's source format when unset
    format: Option<MediaFormat>,
}

enum Placement {
    Planned(ExecutionPlan),
    Wait,
    Cancel(String),
}

/// Instances of one plugin type as seen by a planning round
#[derive(Default)]
struct TypeCapacity<'a> {
    total: usize,
    busy: usize,
    /// Registration order, the last entry is handed out first
    free: Vec<&'a Plugin>,
}

impl<'a> TypeCapacity<'a> {
    fn top(&self) -> Option<&'a Plugin> {
        self.free.last().copied()
    }
}

pub struct Planner {
    jobs: Arc<dyn JobRepository>,
    callbacks: Arc<dyn CallbackNotifier>,
    clock: Arc<dyn TimeProvider>,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        callbacks: Arc<dyn CallbackNotifier>,
        clock: Arc<dyn TimeProvider>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            jobs,
            callbacks,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan as many waiting jobs as capacity allows
    ///
    /// Returns the number of jobs that received a plan.
    pub async fn calculate(&self, plugins: &[Plugin]) -> Result<usize> {
        let mut waiting = self.jobs.waiting_jobs().await?;
        if waiting.is_empty() {
            return Ok(0);
        }
        waiting.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.due_date.cmp(&b.due_date))
        });

        let mut capacity = self.capacity(plugins).await?;
        let mut planned = 0;
        for mut job in waiting {
            match self.place(&job, &capacity)? {
                Placement::Wait => {
                    debug!(job = %job.urn, "No capacity for job, leaving it waiting");
                }
                Placement::Cancel(reason) => self.cancel(job, &reason).await?,
                Placement::Planned(plan) => {
                    claim(&plan, &mut capacity)?;
                    let tasks = plan.tasks.len();
                    job.plan = Some(plan);
                    let job = self.jobs.update(&job).await?;
                    info!(job = %job.urn, "Job planned with {} task(s)", tasks);
                    planned += 1;
                }
            }
        }
        Ok(planned)
    }

    /// Per type bookkeeping
    ///
    /// An asynchronous instance counts as busy when any in-flight task of an
    /// active job is bound to it, even if it has not picked the task up yet.
    async fn capacity<'a>(&self, plugins: &'a [Plugin]) -> Result<HashMap<&'a str, TypeCapacity<'a>>> {
        let reserved: HashSet<String> = self
            .jobs
            .active_jobs()
            .await?
            .into_iter()
            .filter_map(|job| job.plan)
            .flat_map(|plan| plan.tasks)
            .filter(|task| task.state != ExecutionState::Done)
            .map(|task| task.plugin_urn)
            .collect();

        let mut capacity: HashMap<&str, TypeCapacity> = HashMap::new();
        for plugin in plugins {
            let busy = plugin.busy().await || (plugin.async_operation() && reserved.contains(plugin.urn()));
            let entry = capacity.entry(plugin.plugin_type()).or_default();
            entry.total += 1;
            if busy {
                entry.busy += 1;
            } else {
                entry.free.push(plugin);
            }
        }
        Ok(capacity)
    }

    fn place(&self, job: &Job, capacity: &HashMap<&str, TypeCapacity<'_>>) -> Result<Placement> {
        let format = job.destination.format;
        let Some(route) = self.config.route_for(format) else {
            return Ok(Placement::Cancel(format!("no route for destination format {}", format)));
        };
        let Some(primary) = capacity.get(route.plugin_type.as_str()) else {
            return Ok(Placement::Cancel(format!("no {} instance registered", route.plugin_type)));
        };
        if self.held_back(job, route, primary) {
            return Ok(Placement::Wait);
        }

        let mut tasks = Vec::new();
        let mut source = job.source.clone();
        let mut temporary = false;

        for step in self.preprocess_steps() {
            if !job.destination.flags.contains(step.flag) {
                continue;
            }
            let Some(preprocessors) = capacity.get(self.config.preprocessor_type.as_str()) else {
                return Ok(Placement::Cancel(format!(
                    "no {} instance registered for {}",
                    self.config.preprocessor_type, step.label
                )));
            };
            let Some(plugin) = preprocessors.top() else {
                return Ok(Placement::Wait);
            };

            let path = Path::new(&job.source.path).join(format!("tmp-{}-{}", step.label, job.id));
            let to = Essence {
                path: path.to_string_lossy().into_owned(),
                files: Vec::new(),
                format: step.format.unwrap_or(job.source.format),
                flags: source.flags | step.flag,
                attachments: source
                    .attachments
                    .iter()
                    .filter(|a| a.kind != step.attachment)
                    .cloned()
                    .collect(),
                ..source.clone()
            };
            let mut task = ExecutionTask::new(plugin.urn(), source.clone(), to);
            if temporary {
                task.mark_from_temporary();
            }
            if !plugin.check_and_estimate(&mut task)? {
                return Ok(Placement::Cancel(format!("{} rejected the {} step", plugin.urn(), step.label)));
            }

            source = Essence {
                files: source.files.clone(),
                ..task.to.clone()
            };
            temporary = true;
            tasks.push(task);
        }

        let Some(transcoder) = primary.top() else {
            return Ok(Placement::Wait);
        };
        let to = Essence {
            files: Vec::new(),
            ..job.destination.clone()
        };
        let mut transcode = ExecutionTask::new(transcoder.urn(), source, to);
        transcode.arguments.insert(NAME.to_string(), job.name.clone());
        if temporary {
            transcode.mark_from_temporary();
        }
        if !transcoder.check_and_estimate(&mut transcode)? {
            return Ok(Placement::Cancel(format!("{} rejected the transcode step", transcoder.urn())));
        }
        let transcoded = transcode.to.clone();
        tasks.push(transcode);

        if !job.destination.files.is_empty() {
            let renamer = capacity
                .get(self.config.renamer_type.as_str())
                .filter(|renamers| renamers.free.len() == 1)
                .and_then(TypeCapacity::top)
                .ok_or_else(|| {
                    EngineError::Configuration(format!(
                        "{} must be registered exactly once and always be free",
                        self.config.renamer_type
                    ))
                })?;
            let mut rename = ExecutionTask::new(renamer.urn(), transcoded, job.destination.clone());
            if !renamer.check_and_estimate(&mut rename)? {
                return Ok(Placement::Cancel(format!("{} rejected the rename step", renamer.urn())));
            }
            tasks.push(rename);
        }

        Ok(Placement::Planned(ExecutionPlan::new(tasks)))
    }

    /// Whether the job must leave the last free instance to someone else
    fn held_back(&self, job: &Job, route: &Route, capacity: &TypeCapacity<'_>) -> bool {
        let long = i64::try_from(job.source.duration_ms).unwrap_or(i64::MAX)
            > self.config.long_duration.num_milliseconds();
        route.reserve_last_instance
            && job.priority != Priority::High
            && capacity.total > 1
            && capacity.busy + 1 >= capacity.total
            && long
    }

    fn preprocess_steps(&self) -> [Preprocess; 2] {
        [
            Preprocess {
                flag: EssenceFlags::HARD_SUBTITLES,
                attachment: AttachmentKind::Subtitle,
                label: "hardsubs",
                format: Some(self.config.hard_subtitles_format),
            },
            Preprocess {
                flag: EssenceFlags::ALTERNATE_AUDIO,
                attachment: AttachmentKind::Audio,
                label: "mux",
                format: None,
            },
        ]
    }

    async fn cancel(&self, mut job: Job, reason: &str) -> Result<()> {
        job.plan = Some(ExecutionPlan::canceled());
        job.end_time = Some(self.clock.now());
        let job = self.jobs.update(&job).await?;
        notify_job(self.callbacks.as_ref(), &job).await;
        warn!(job = %job.urn, "Unable to calculate plan for job: {}", reason);
        Ok(())
    }
}

/// Take the instances of a fresh plan off the free stacks
///
/// Every distinct instance must be the top of its stack. Synchronous
/// instances finish within a pulse and stay free.
fn claim(plan: &ExecutionPlan, capacity: &mut HashMap<&str, TypeCapacity<'_>>) -> Result<()> {
    let mut seen = HashSet::new();
    for task in &plan.tasks {
        if !seen.insert(task.plugin_urn.as_str()) {
            continue;
        }
        let stack = urn::plugin_type_from_urn(&task.plugin_urn)
            .and_then(|plugin_type| capacity.get_mut(plugin_type))
            .ok_or_else(|| EngineError::Inconsistent(format!("no capacity for {}", task.plugin_urn)))?;
        let top = stack
            .top()
            .filter(|plugin| plugin.urn() == task.plugin_urn)
            .ok_or_else(|| {
                EngineError::Inconsistent(format!("{} is not the next free instance", task.plugin_urn))
            })?;
        if top.async_operation() {
            stack.free.pop();
            stack.busy += 1;
        }
    }
    Ok(())
}
