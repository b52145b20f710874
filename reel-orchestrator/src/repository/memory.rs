//! In-memory repositories
//!
//! Used by tests, the simulator and deployments without `DATABASE_URL`.
//! Timestamps come from the injected clock so virtual time drives them too.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use reel_core::domain::{Command, ExecutionState, Job, Semaphore};
use reel_core::time::TimeProvider;

use super::{
    CommandRepository, DEFAULT_SEMAPHORE_MAX_AGE_SECS, JobRepository, RepositoryError, Result,
    SemaphoreRepository, next_stamp,
};

pub struct MemoryJobRepository {
    jobs: Mutex<HashMap<String, Job>>,
    clock: Arc<dyn TimeProvider>,
}

impl MemoryJobRepository {
    pub fn new(clock: Arc<dyn TimeProvider>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn select(&self, keep: impl Fn(&Job) -> bool) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.lock().values().filter(|j| keep(*j)).cloned().collect();
        jobs.sort_by_key(|j| j.issued);
        jobs
    }

    fn terminal(&self, state: ExecutionState, since: Option<DateTime<Utc>>) -> Vec<Job> {
        self.select(|job| {
            in_state(job, &[state]) && since.is_none_or(|since| job.end_time.is_some_and(|end| end >= since))
        })
    }
}

fn in_state(job: &Job, states: &[ExecutionState]) -> bool {
    matches!(job.plan_state(), Ok(Some(state)) if states.contains(&state))
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn add(&self, mut job: Job) -> Result<Job> {
        let mut jobs = self.jobs.lock();
        if jobs.contains_key(&job.urn) {
            return Err(RepositoryError::Duplicate(job.urn));
        }
        job.last_modified = self.clock.now();
        jobs.insert(job.urn.clone(), job.clone());
        Ok(job)
    }

    async fn update(&self, job: &Job) -> Result<Job> {
        let mut jobs = self.jobs.lock();
        let stored = jobs
            .get_mut(&job.urn)
            .ok_or_else(|| RepositoryError::NotFound(job.urn.clone()))?;
        if stored.last_modified != job.last_modified {
            return Err(RepositoryError::Conflict(job.urn.clone()));
        }

        let mut fresh = job.clone();
        fresh.last_modified = next_stamp(self.clock.now(), stored.last_modified);
        *stored = fresh.clone();
        Ok(fresh)
    }

    async fn get(&self, urn: &str) -> Result<Option<Job>> {
        Ok(self.jobs.lock().get(urn).cloned())
    }

    async fn newest(&self) -> Result<Option<Job>> {
        Ok(self.jobs.lock().values().max_by_key(|j| j.issued).cloned())
    }

    async fn waiting_jobs(&self) -> Result<Vec<Job>> {
        Ok(self.select(Job::is_waiting))
    }

    async fn active_jobs(&self) -> Result<Vec<Job>> {
        Ok(self.select(|job| in_state(job, &[ExecutionState::Queued, ExecutionState::Running])))
    }

    async fn done_jobs(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Job>> {
        Ok(self.terminal(ExecutionState::Done, since))
    }

    async fn failed_jobs(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Job>> {
        Ok(self.terminal(ExecutionState::Failed, since))
    }

    async fn canceled_jobs(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Job>> {
        Ok(self.terminal(ExecutionState::Canceled, since))
    }
}

#[derive(Default)]
pub struct MemoryCommandRepository {
    commands: Mutex<Vec<Command>>,
}

impl MemoryCommandRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommandRepository for MemoryCommandRepository {
    async fn add(&self, command: Command) -> Result<()> {
        let mut commands = self.commands.lock();
        if commands
            .iter()
            .any(|c| c.urn == command.urn && c.kind == command.kind)
        {
            return Err(RepositoryError::Duplicate(format!(
                "{} command for {}",
                command.kind.as_str(),
                command.urn
            )));
        }
        commands.push(command);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Command>> {
        Ok(self.commands.lock().clone())
    }

    async fn remove(&self, command: &Command) -> Result<()> {
        self.commands
            .lock()
            .retain(|c| !(c.urn == command.urn && c.kind == command.kind));
        Ok(())
    }
}

pub struct MemorySemaphoreRepository {
    semaphores: Mutex<HashMap<String, Semaphore>>,
    clock: Arc<dyn TimeProvider>,
    max_age: TimeDelta,
}

impl MemorySemaphoreRepository {
    pub fn new(clock: Arc<dyn TimeProvider>) -> Self {
        Self::with_max_age(clock, TimeDelta::seconds(DEFAULT_SEMAPHORE_MAX_AGE_SECS))
    }

    pub fn with_max_age(clock: Arc<dyn TimeProvider>, max_age: TimeDelta) -> Self {
        Self {
            semaphores: Mutex::new(HashMap::new()),
            clock,
            max_age,
        }
    }
}

#[async_trait]
impl SemaphoreRepository for MemorySemaphoreRepository {
    async fn acquire(&self, id: &str, caller: &str) -> Result<bool> {
        let now = self.clock.now();
        let mut semaphores = self.semaphores.lock();
        let granted = match semaphores.get(id) {
            None => true,
            Some(lease) => match &lease.owner {
                None => true,
                Some(owner) => owner == caller || lease.heartbeat < now - self.max_age,
            },
        };
        if granted {
            semaphores.insert(
                id.to_string(),
                Semaphore {
                    id: id.to_string(),
                    owner: Some(caller.to_string()),
                    heartbeat: now,
                },
            );
        }
        Ok(granted)
    }

    async fn release(&self, id: &str, caller: &str) -> Result<bool> {
        let mut semaphores = self.semaphores.lock();
        match semaphores.get_mut(id) {
            Some(lease) if lease.owner.as_deref() == Some(caller) => {
                lease.owner = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn probe(&self, id: &str) -> Result<Option<Semaphore>> {
        Ok(self.semaphores.lock().get(id).cloned())
    }

    fn max_age(&self) -> TimeDelta {
        self.max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_core::domain::{Essence, ExecutionPlan, ExecutionTask};
    use reel_core::time::VirtualClock;

    fn clock() -> Arc<VirtualClock> {
        Arc::new(VirtualClock::new(Utc::now()))
    }

    fn job(clock: &VirtualClock) -> Job {
        Job::new("clip", Essence::default(), Essence::default(), clock.now())
    }

    #[tokio::test]
    async fn test_update_rejects_stale_copy() {
        let clock = clock();
        let repo = MemoryJobRepository::new(clock.clone());
        let stored = repo.add(job(&clock)).await.unwrap();

        let mut first = stored.clone();
        first.name = "first".to_string();
        let fresh = repo.update(&first).await.unwrap();
        assert!(fresh.last_modified > stored.last_modified);

        let mut stale = stored;
        stale.name = "stale".to_string();
        assert!(matches!(
            repo.update(&stale).await,
            Err(RepositoryError::Conflict(_))
        ));

        let again = repo.update(&fresh).await.unwrap();
        assert_eq!(again.name, "first");
    }

    #[tokio::test]
    async fn test_update_unknown_job() {
        let clock = clock();
        let repo = MemoryJobRepository::new(clock.clone());
        assert!(matches!(
            repo.update(&job(&clock)).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_jobs_are_partitioned_by_plan_state() {
        let clock = clock();
        let repo = MemoryJobRepository::new(clock.clone());
        let waiting = repo.add(job(&clock)).await.unwrap();

        let mut active = job(&clock);
        active.plan = Some(ExecutionPlan::new(vec![ExecutionTask::new(
            "urn:reel:plugin:dummy:1",
            Essence::default(),
            Essence::default(),
        )]));
        let active = repo.add(active).await.unwrap();

        let mut canceled = job(&clock);
        canceled.plan = Some(ExecutionPlan::canceled());
        canceled.end_time = Some(clock.now());
        repo.add(canceled).await.unwrap();

        let urns = |jobs: Vec<Job>| jobs.into_iter().map(|j| j.urn).collect::<Vec<_>>();
        assert_eq!(urns(repo.waiting_jobs().await.unwrap()), vec![waiting.urn]);
        assert_eq!(urns(repo.active_jobs().await.unwrap()), vec![active.urn]);
        assert_eq!(repo.canceled_jobs(None).await.unwrap().len(), 1);
        assert!(
            repo.canceled_jobs(Some(clock.now() + TimeDelta::seconds(1)))
                .await
                .unwrap()
                .is_empty()
        );
        assert!(repo.done_jobs(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_command_rejected() {
        let repo = MemoryCommandRepository::new();
        let command = Command::cancel("urn:reel:job:1", "alice");
        repo.add(command.clone()).await.unwrap();
        assert!(matches!(
            repo.add(command.clone()).await,
            Err(RepositoryError::Duplicate(_))
        ));

        repo.remove(&command).await.unwrap();
        assert!(repo.all().await.unwrap().is_empty());
        repo.add(command).await.unwrap();
    }

    #[tokio::test]
    async fn test_semaphore_expires_and_transfers() {
        let clock = clock();
        let repo = MemorySemaphoreRepository::new(clock.clone());

        assert!(repo.acquire("executor", "a:8080").await.unwrap());
        assert!(!repo.acquire("executor", "b:8080").await.unwrap());
        assert!(repo.acquire("executor", "a:8080").await.unwrap());

        clock.step(TimeDelta::seconds(61)).unwrap();
        assert!(repo.acquire("executor", "b:8080").await.unwrap());
        let lease = repo.probe("executor").await.unwrap().unwrap();
        assert_eq!(lease.owner.as_deref(), Some("b:8080"));
        assert_eq!(lease.heartbeat, clock.now());
        assert!(!repo.acquire("executor", "a:8080").await.unwrap());
    }

    #[tokio::test]
    async fn test_semaphore_release_requires_owner() {
        let clock = clock();
        let repo = MemorySemaphoreRepository::new(clock.clone());
        repo.acquire("executor", "a:8080").await.unwrap();

        assert!(!repo.release("executor", "b:8080").await.unwrap());
        assert!(repo.release("executor", "a:8080").await.unwrap());
        assert!(repo.acquire("executor", "b:8080").await.unwrap());
    }
}
